pub mod board_ops;
pub mod replay;
