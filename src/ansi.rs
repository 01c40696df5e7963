pub const MAGENTA: &str = "\x1b[35m";
pub const RESET: &str = "\x1b[0m";
