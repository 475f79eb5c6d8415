pub mod directory_mirror;

pub use directory_mirror::FsDirectoryMirror;
