pub mod composer;
pub mod shapes;

pub use composer::{Composer, Outcome, execute};
pub use shapes::{DeliberationKind, DeliberationRequest, Input, RequestShape, SHAPES, Selection};
