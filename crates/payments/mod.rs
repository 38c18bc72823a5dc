pub mod lemon_squeezy;
