mod common;

mod lifecycle;
