pub mod claude_code;
pub mod discover;
