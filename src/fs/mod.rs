//! FAT16 filesystem: boot sector and MBR parsing, the file allocation
//! table, directory entries, and the mounted-volume API the shell and
//! editor drive.

pub mod dir_entry;
pub mod error;
pub mod fat_table;
pub mod geometry;
pub mod mbr;
pub mod volume;

pub use dir_entry::DirEntry;
pub use error::Fat16Error;
pub use volume::{Fat16Volume, VolumeSpace};
