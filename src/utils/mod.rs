pub mod clipboard;
pub mod logging;
pub mod speech_command;
#[cfg(test)]
pub mod test_utils;
pub mod url;
