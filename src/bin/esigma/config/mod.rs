mod study;

pub use study::load_study;
