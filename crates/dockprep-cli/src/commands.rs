pub mod build;
pub mod extract;
pub mod select;
pub mod spheres;
