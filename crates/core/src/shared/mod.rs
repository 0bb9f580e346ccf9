pub mod draw;
pub mod frame;
pub mod gray;
pub mod rect;
