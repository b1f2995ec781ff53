pub mod elevate;
