pub mod golfbox;
