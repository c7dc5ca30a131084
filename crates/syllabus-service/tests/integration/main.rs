mod aggregate;
mod facade;
mod lifecycle;
mod utils;
