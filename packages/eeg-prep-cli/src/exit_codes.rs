//! Process exit codes shared by all subcommands.

pub const SUCCESS: i32 = 0;
/// Processing failed after the inputs were accepted
pub const EXECUTION_ERROR: i32 = 1;
/// Bad arguments, unreadable or invalid input files
pub const INPUT_ERROR: i32 = 2;
/// Batch run where some recordings failed and some succeeded
pub const PARTIAL_FAILURE: i32 = 3;
