//! Built-in checks

pub mod commented_code;
pub mod declarations;
pub mod indentation;
pub mod trailing_whitespace;

use crate::engine::Check;

pub use commented_code::CommentedCodeCheck;
pub use declarations::DeclarationDistanceCheck;
pub use indentation::IndentationCheck;
pub use trailing_whitespace::TrailingWhitespaceCheck;

/// The default check set, in registration (and same-node report) order
pub fn default_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(IndentationCheck),
        Box::new(TrailingWhitespaceCheck),
        Box::new(DeclarationDistanceCheck),
        Box::new(CommentedCodeCheck::new()),
    ]
}
