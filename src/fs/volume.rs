//! The mounted FAT16 volume: directory traversal, file and directory
//! operations, and the current-working-directory state a shell session
//! needs.
//!
//! Grounded on `find_file_in_root_directory`/`parse_root_directory` from
//! the teacher's FAT12 driver for the traversal shape, and on
//! `find_entry`/`remove_entry`/`init_directory`/`is_directory_empty` from
//! the FAT16 reference driver in the example pack for the create/delete
//! semantics (dual-FAT writes, `.`/`..` entries in new subdirectories,
//! refusing to remove a non-empty directory).

use super::dir_entry::{
    self, make_83, DirEntry, EntryState, ATTR_ARCHIVE, ATTR_DIRECTORY,
};
use super::error::{set_last_error, Fat16Error};
use super::fat_table::{allocate_cluster, extend_chain, free_chain, walk_chain};
use super::geometry::{Bpb, VolumeGeometry, DIR_ENTRY_SIZE, FIRST_DATA_CLUSTER};
use super::mbr::find_fat16_partition;
use crate::block::{BlockDevice, SECTOR_SIZE};

const ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;

fn dot_name() -> [u8; 11] {
    let mut name = [b' '; 11];
    name[0] = b'.';
    name
}

fn dotdot_name() -> [u8; 11] {
    let mut name = [b' '; 11];
    name[0] = b'.';
    name[1] = b'.';
    name
}

/// Maximum nesting depth a path can resolve through. Bounds `cd`/lookup
/// loops the same way the editor bounds its buffer: a fixed limit instead
/// of unbounded recursion, since there is no heap to grow a path stack on.
pub const MAX_PATH_DEPTH: usize = 16;

/// Largest cluster chain `read`/`free_chain` will walk in one call. The
/// editor's own buffer cap (16 KiB) keeps real files well under this;
/// it exists as a hard backstop against a corrupt chain spinning forever.
const MAX_FILE_CLUSTERS: usize = 4096;

/// Root is a fixed extent before the data region; subdirectories live in
/// ordinary cluster chains. The two need different traversal code, so the
/// distinction is explicit everywhere it matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirLocation {
    Root,
    Cluster(u16),
}

#[derive(Debug, Clone, Copy)]
struct EntrySlot {
    lba: u32,
    index: usize,
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

fn visit_sector<F>(device: &mut dyn BlockDevice, lba: u32, f: &mut F) -> Result<Flow, Fat16Error>
where
    F: FnMut(u32, usize, &mut [u8; DIR_ENTRY_SIZE]) -> Result<Flow, Fat16Error>,
{
    let mut sector = [0u8; SECTOR_SIZE];
    device.read_sector(lba, &mut sector).map_err(|_| Fat16Error::Io)?;

    let mut result = Flow::Continue;
    for i in 0..ENTRIES_PER_SECTOR {
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        raw.copy_from_slice(&sector[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE]);
        let flow = f(lba, i, &mut raw)?;
        sector[i * DIR_ENTRY_SIZE..(i + 1) * DIR_ENTRY_SIZE].copy_from_slice(&raw);
        if flow == Flow::Stop {
            result = Flow::Stop;
            break;
        }
    }

    device.write_sector(lba, &sector).map_err(|_| Fat16Error::Io)?;
    Ok(result)
}

fn for_each_dir_slot(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
    mut f: impl FnMut(u32, usize, &mut [u8; DIR_ENTRY_SIZE]) -> Result<Flow, Fat16Error>,
) -> Result<(), Fat16Error> {
    match dir {
        DirLocation::Root => {
            for sector_index in 0..geometry.root_dir_sector_count {
                let lba = geometry.root_dir_start_lba + sector_index;
                if visit_sector(device, lba, &mut f)? == Flow::Stop {
                    return Ok(());
                }
            }
            Ok(())
        }
        DirLocation::Cluster(first) => {
            let mut cluster = first;
            loop {
                for sector_offset in 0..geometry.sectors_per_cluster() {
                    let lba = geometry.cluster_to_lba(cluster) + sector_offset;
                    if visit_sector(device, lba, &mut f)? == Flow::Stop {
                        return Ok(());
                    }
                }
                let next = super::fat_table::read_entry(device, geometry, cluster)?;
                if super::fat_table::is_end_of_chain(next) {
                    return Ok(());
                }
                cluster = next;
            }
        }
    }
}

fn find_entry_matching(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
    matcher: impl Fn(&DirEntry) -> bool,
) -> Result<Option<(EntrySlot, DirEntry)>, Fat16Error> {
    let mut found = None;

    for_each_dir_slot(device, geometry, dir, |lba, index, raw| {
        match DirEntry::state(raw) {
            EntryState::EndOfDirectory => Ok(Flow::Stop),
            EntryState::Free | EntryState::LongNamePart => Ok(Flow::Continue),
            EntryState::InUse => {
                let entry = DirEntry::parse(raw);
                if matcher(&entry) {
                    found = Some((EntrySlot { lba, index }, entry));
                    Ok(Flow::Stop)
                } else {
                    Ok(Flow::Continue)
                }
            }
        }
    })?;

    Ok(found)
}

/// Look up a directory entry by its displayed 8.3 name (e.g. `"a.txt"`).
/// Rejects `"."`/`".."` the same way creating a file with those names
/// would, since they are not ordinary directory entries.
fn find_entry_slot(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
    name: &str,
) -> Result<Option<(EntrySlot, DirEntry)>, Fat16Error> {
    find_entry_matching(device, geometry, dir, |entry| {
        dir_entry::names_match(&entry.name_raw, name)
    })
}

/// Look up the `".."` pseudo-entry of a subdirectory cluster to find its
/// parent. `"."`/`".."` are written with raw packed bytes that `make_83`
/// (and therefore [`find_entry_slot`]) deliberately rejects, so they need
/// their own lookup.
fn find_dotdot_entry(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
) -> Result<Option<(EntrySlot, DirEntry)>, Fat16Error> {
    find_entry_matching(device, geometry, dir, |entry| entry.name_raw == dotdot_name())
}

/// Collect at most `buf.len()` directory entries, returning how many were
/// written. Bounded because there is no heap to return an unbounded
/// listing into.
fn list_entries(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
    buf: &mut [DirEntry],
) -> Result<usize, Fat16Error> {
    let mut count = 0;

    for_each_dir_slot(device, geometry, dir, |_lba, _index, raw| {
        match DirEntry::state(raw) {
            EntryState::EndOfDirectory => Ok(Flow::Stop),
            EntryState::Free | EntryState::LongNamePart => Ok(Flow::Continue),
            EntryState::InUse => {
                if count < buf.len() {
                    buf[count] = DirEntry::parse(raw);
                    count += 1;
                    Ok(Flow::Continue)
                } else {
                    Ok(Flow::Stop)
                }
            }
        }
    })?;

    Ok(count)
}

/// Find a slot to write a new entry into: a free (`0xE5`) slot, or the
/// end-of-directory marker (which becomes the new entry, with the
/// following slot zeroed to remain the new end marker). Extends the
/// directory's cluster chain if no slot exists; fails closed with
/// `RootDirectoryFull` for the root, which cannot grow.
fn find_or_make_free_slot(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    dir: DirLocation,
) -> Result<EntrySlot, Fat16Error> {
    let mut found = None;

    for_each_dir_slot(device, geometry, dir, |lba, index, raw| {
        match DirEntry::state(raw) {
            EntryState::Free => {
                found = Some(EntrySlot { lba, index });
                Ok(Flow::Stop)
            }
            EntryState::EndOfDirectory => {
                found = Some(EntrySlot { lba, index });
                Ok(Flow::Stop)
            }
            _ => Ok(Flow::Continue),
        }
    })?;

    if let Some(slot) = found {
        return Ok(slot);
    }

    match dir {
        DirLocation::Root => Err(Fat16Error::RootDirectoryFull),
        DirLocation::Cluster(first) => {
            let tail = last_cluster_in_chain(device, geometry, first)?;
            let new_cluster = extend_chain(device, geometry, tail)?;
            zero_cluster(device, geometry, new_cluster)?;
            Ok(EntrySlot {
                lba: geometry.cluster_to_lba(new_cluster),
                index: 0,
            })
        }
    }
}

fn last_cluster_in_chain(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    first: u16,
) -> Result<u16, Fat16Error> {
    let mut last = first;
    walk_chain(device, geometry, first, |cluster| {
        last = cluster;
        Ok(())
    })?;
    Ok(last)
}

fn zero_cluster(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    cluster: u16,
) -> Result<(), Fat16Error> {
    let zero_sector = [0u8; SECTOR_SIZE];
    for sector_offset in 0..geometry.sectors_per_cluster() {
        device
            .write_sector(geometry.cluster_to_lba(cluster) + sector_offset, &zero_sector)
            .map_err(|_| Fat16Error::Io)?;
    }
    Ok(())
}

fn write_entry_at(
    device: &mut dyn BlockDevice,
    slot: EntrySlot,
    entry: &DirEntry,
    clear_next_end_marker: bool,
) -> Result<(), Fat16Error> {
    let mut sector = [0u8; SECTOR_SIZE];
    device.read_sector(slot.lba, &mut sector).map_err(|_| Fat16Error::Io)?;

    let mut raw = [0u8; DIR_ENTRY_SIZE];
    entry.write(&mut raw);
    sector[slot.index * DIR_ENTRY_SIZE..(slot.index + 1) * DIR_ENTRY_SIZE].copy_from_slice(&raw);

    if clear_next_end_marker && slot.index + 1 < ENTRIES_PER_SECTOR {
        let start = (slot.index + 1) * DIR_ENTRY_SIZE;
        sector[start..start + DIR_ENTRY_SIZE].fill(0);
    }

    device.write_sector(slot.lba, &sector).map_err(|_| Fat16Error::Io)?;
    Ok(())
}

/// Initialize a freshly allocated subdirectory cluster with `.` and `..`
/// entries, matching `init_directory` in the FAT16 reference driver.
fn init_directory_cluster(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    new_cluster: u16,
    parent_cluster: u16,
) -> Result<(), Fat16Error> {
    zero_cluster(device, geometry, new_cluster)?;

    let dot = DirEntry {
        name_raw: dot_name(),
        attributes: ATTR_DIRECTORY,
        first_cluster: new_cluster,
        file_size: 0,
    };
    let dotdot = DirEntry {
        name_raw: dotdot_name(),
        attributes: ATTR_DIRECTORY,
        first_cluster: parent_cluster,
        file_size: 0,
    };

    let lba = geometry.cluster_to_lba(new_cluster);
    let mut sector = [0u8; SECTOR_SIZE];
    device.read_sector(lba, &mut sector).map_err(|_| Fat16Error::Io)?;

    let mut raw = [0u8; DIR_ENTRY_SIZE];
    dot.write(&mut raw);
    sector[0..DIR_ENTRY_SIZE].copy_from_slice(&raw);
    dotdot.write(&mut raw);
    sector[DIR_ENTRY_SIZE..2 * DIR_ENTRY_SIZE].copy_from_slice(&raw);

    device.write_sector(lba, &sector).map_err(|_| Fat16Error::Io)?;
    Ok(())
}

fn is_directory_empty(
    device: &mut dyn BlockDevice,
    geometry: &VolumeGeometry,
    cluster: u16,
) -> Result<bool, Fat16Error> {
    let mut only_dots = true;

    for_each_dir_slot(device, geometry, DirLocation::Cluster(cluster), |_lba, _index, raw| {
        match DirEntry::state(raw) {
            EntryState::EndOfDirectory => Ok(Flow::Stop),
            EntryState::Free | EntryState::LongNamePart => Ok(Flow::Continue),
            EntryState::InUse => {
                let entry = DirEntry::parse(raw);
                let is_dot = entry.name_raw == dot_name() || entry.name_raw == dotdot_name();
                if !is_dot {
                    only_dots = false;
                    Ok(Flow::Stop)
                } else {
                    Ok(Flow::Continue)
                }
            }
        }
    })?;

    Ok(only_dots)
}

/// A mounted FAT16 volume bound to a block device, plus the current
/// working directory a shell session navigates with `cd`.
pub struct Fat16Volume<D: BlockDevice> {
    device: D,
    geometry: VolumeGeometry,
    current_dir: DirLocation,
    path_components: [[u8; 11]; MAX_PATH_DEPTH],
    path_depth: usize,
}

impl<D: BlockDevice> Fat16Volume<D> {
    /// Scan the MBR for a FAT16 partition, parse its BPB, and mount it at
    /// the root directory.
    pub fn mount(mut device: D) -> Result<Self, Fat16Error> {
        let mut mbr = [0u8; SECTOR_SIZE];
        device.read_sector(0, &mut mbr).map_err(|_| Fat16Error::Io)?;
        let partition_start = find_fat16_partition(&mbr)?;

        let mut boot_sector = [0u8; SECTOR_SIZE];
        device
            .read_sector(partition_start, &mut boot_sector)
            .map_err(|_| Fat16Error::Io)?;
        let bpb = Bpb::parse(&boot_sector)?;
        let geometry = VolumeGeometry::new(partition_start, bpb)?;

        Ok(Self {
            device,
            geometry,
            current_dir: DirLocation::Root,
            path_components: [[0u8; 11]; MAX_PATH_DEPTH],
            path_depth: 0,
        })
    }

    /// Mount directly from a pre-parsed geometry, skipping MBR/BPB
    /// discovery. Used by tests that build a volume in memory.
    pub fn mount_with_geometry(device: D, geometry: VolumeGeometry) -> Self {
        Self {
            device,
            geometry,
            current_dir: DirLocation::Root,
            path_components: [[0u8; 11]; MAX_PATH_DEPTH],
            path_depth: 0,
        }
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    fn fail(&self, error: Fat16Error) -> Fat16Error {
        set_last_error(error);
        error
    }

    /// Resolve a path (absolute if it starts with `/`, otherwise relative
    /// to the current directory) to the directory it names.
    fn resolve_dir(&mut self, path: &str) -> Result<DirLocation, Fat16Error> {
        let mut dir = if path.starts_with('/') {
            DirLocation::Root
        } else {
            self.current_dir
        };

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." {
                continue;
            }
            if component == ".." {
                dir = match dir {
                    DirLocation::Root => DirLocation::Root,
                    DirLocation::Cluster(cluster) => {
                        let (_, entry) =
                            find_dotdot_entry(&mut self.device, &self.geometry, DirLocation::Cluster(cluster))?
                                .ok_or_else(|| self.fail(Fat16Error::Io))?;
                        if entry.first_cluster == 0 {
                            DirLocation::Root
                        } else {
                            DirLocation::Cluster(entry.first_cluster)
                        }
                    }
                };
                continue;
            }

            let (_, entry) = find_entry_slot(&mut self.device, &self.geometry, dir, component)?
                .ok_or_else(|| self.fail(Fat16Error::NotFound))?;
            if !entry.is_directory() {
                return Err(self.fail(Fat16Error::NotADirectory));
            }
            dir = if entry.first_cluster == 0 {
                DirLocation::Root
            } else {
                DirLocation::Cluster(entry.first_cluster)
            };
        }

        Ok(dir)
    }

    /// Split a path into its parent directory and final component name.
    fn resolve_parent_and_name<'a>(
        &mut self,
        path: &'a str,
    ) -> Result<(DirLocation, &'a str), Fat16Error> {
        let (parent_path, name) = match path.rsplit_once('/') {
            Some((parent, name)) => (parent, name),
            None => ("", path),
        };

        if name.is_empty() {
            return Err(self.fail(Fat16Error::InvalidName));
        }

        let parent = if parent_path.is_empty() {
            if path.starts_with('/') {
                DirLocation::Root
            } else {
                self.current_dir
            }
        } else {
            self.resolve_dir(parent_path)?
        };

        Ok((parent, name))
    }

    pub fn cd(&mut self, path: &str) -> Result<(), Fat16Error> {
        let dir = self.resolve_dir(path)?;
        self.apply_cd(path, dir)
    }

    fn apply_cd(&mut self, path: &str, dir: DirLocation) -> Result<(), Fat16Error> {
        self.current_dir = dir;

        if path.starts_with('/') {
            self.path_depth = 0;
        }

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if component == "." {
                continue;
            }
            if component == ".." {
                self.path_depth = self.path_depth.saturating_sub(1);
                continue;
            }
            if self.path_depth >= MAX_PATH_DEPTH {
                return Err(self.fail(Fat16Error::NameTooLong));
            }
            self.path_components[self.path_depth] =
                make_83(component).map_err(|_| self.fail(Fat16Error::InvalidName))?;
            self.path_depth += 1;
        }

        Ok(())
    }

    /// Render the current working directory as `/a/b/c` into `buf`,
    /// returning the number of bytes written.
    pub fn pwd<'b>(&self, buf: &'b mut [u8]) -> &'b str {
        let mut pos = 0;
        if self.path_depth == 0 {
            if !buf.is_empty() {
                buf[0] = b'/';
                pos = 1;
            }
        } else {
            for packed in &self.path_components[..self.path_depth] {
                if pos < buf.len() {
                    buf[pos] = b'/';
                    pos += 1;
                }
                let display = dir_entry::format_8_3_display(packed);
                let len = display.iter().take_while(|&&b| b != 0).count();
                for &byte in &display[..len] {
                    if pos < buf.len() {
                        buf[pos] = byte;
                        pos += 1;
                    }
                }
            }
        }
        core::str::from_utf8(&buf[..pos]).unwrap_or("/")
    }

    pub fn ls(&mut self, path: &str, buf: &mut [DirEntry]) -> Result<usize, Fat16Error> {
        let dir = self.resolve_dir(path)?;
        list_entries(&mut self.device, &self.geometry, dir, buf).map_err(|e| self.fail(e))
    }

    pub fn mkdir(&mut self, path: &str) -> Result<(), Fat16Error> {
        let (parent, name) = self.resolve_parent_and_name(path)?;
        let packed_name = make_83(name).map_err(|_| self.fail(Fat16Error::InvalidName))?;

        if find_entry_slot(&mut self.device, &self.geometry, parent, name)?.is_some() {
            return Err(self.fail(Fat16Error::AlreadyExists));
        }

        let parent_cluster = match parent {
            DirLocation::Root => 0,
            DirLocation::Cluster(c) => c,
        };

        let new_cluster = allocate_cluster(&mut self.device, &self.geometry).map_err(|e| self.fail(e))?;
        init_directory_cluster(&mut self.device, &self.geometry, new_cluster, parent_cluster)
            .map_err(|e| self.fail(e))?;

        let slot = match find_or_make_free_slot(&mut self.device, &self.geometry, parent) {
            Ok(slot) => slot,
            Err(e) => {
                let _ = free_chain(&mut self.device, &self.geometry, new_cluster);
                return Err(self.fail(e));
            }
        };

        let entry = DirEntry {
            name_raw: packed_name,
            attributes: ATTR_DIRECTORY,
            first_cluster: new_cluster,
            file_size: 0,
        };
        write_entry_at(&mut self.device, slot, &entry, true).map_err(|e| self.fail(e))
    }

    pub fn touch(&mut self, path: &str) -> Result<(), Fat16Error> {
        let (parent, name) = self.resolve_parent_and_name(path)?;
        let packed_name = make_83(name).map_err(|_| self.fail(Fat16Error::InvalidName))?;

        if find_entry_slot(&mut self.device, &self.geometry, parent, name)?.is_some() {
            return Err(self.fail(Fat16Error::AlreadyExists));
        }

        let slot =
            find_or_make_free_slot(&mut self.device, &self.geometry, parent).map_err(|e| self.fail(e))?;

        let entry = DirEntry {
            name_raw: packed_name,
            attributes: ATTR_ARCHIVE,
            first_cluster: 0,
            file_size: 0,
        };
        write_entry_at(&mut self.device, slot, &entry, true).map_err(|e| self.fail(e))
    }

    fn find_file(&mut self, path: &str) -> Result<(DirLocation, EntrySlot, DirEntry), Fat16Error> {
        let (parent, name) = self.resolve_parent_and_name(path)?;
        let (slot, entry) = find_entry_slot(&mut self.device, &self.geometry, parent, name)?
            .ok_or_else(|| self.fail(Fat16Error::NotFound))?;
        if entry.is_directory() {
            return Err(self.fail(Fat16Error::IsADirectory));
        }
        Ok((parent, slot, entry))
    }

    /// Read an entire file's contents into `buf`, returning the number of
    /// bytes read (which is the file's size; `buf` must be at least that
    /// large).
    pub fn read(&mut self, path: &str, buf: &mut [u8]) -> Result<usize, Fat16Error> {
        let (_, _, entry) = self.find_file(path)?;
        let size = entry.file_size as usize;
        if size > buf.len() {
            return Err(self.fail(Fat16Error::BufferTooSmall));
        }
        if size == 0 {
            return Ok(0);
        }

        // Collect the chain first, since a closure borrowing `self.device`
        // for the walk can't also borrow `self.geometry`/`self.device`
        // again to do the actual sector reads.
        let mut clusters = [0u16; MAX_FILE_CLUSTERS];
        let mut cluster_count = 0usize;
        walk_chain(&mut self.device, &self.geometry, entry.first_cluster, |cluster| {
            if cluster_count >= clusters.len() {
                return Err(Fat16Error::Io);
            }
            clusters[cluster_count] = cluster;
            cluster_count += 1;
            Ok(())
        })
        .map_err(|e| self.fail(e))?;

        let mut written = 0usize;
        for &cluster in &clusters[..cluster_count] {
            let lba = self.geometry.cluster_to_lba(cluster);
            for sector_offset in 0..self.geometry.sectors_per_cluster() {
                if written >= size {
                    break;
                }
                let mut sector = [0u8; SECTOR_SIZE];
                self.device
                    .read_sector(lba + sector_offset, &mut sector)
                    .map_err(|_| self.fail(Fat16Error::Io))?;
                let remaining = size - written;
                let take = remaining.min(SECTOR_SIZE);
                buf[written..written + take].copy_from_slice(&sector[..take]);
                written += take;
            }
        }

        Ok(written)
    }

    /// Replace a file's contents with `data`. The old chain is freed only
    /// after the new chain is fully written, so a write failure partway
    /// through never leaves the file without any valid data. If the file
    /// doesn't exist yet, it is created in a free directory slot.
    pub fn write(&mut self, path: &str, data: &[u8]) -> Result<(), Fat16Error> {
        let (parent, name) = self.resolve_parent_and_name(path)?;
        let existing = find_entry_slot(&mut self.device, &self.geometry, parent, name)?;

        if let Some((_, entry)) = &existing {
            if entry.is_directory() {
                return Err(self.fail(Fat16Error::IsADirectory));
            }
        }

        let packed_name = match &existing {
            Some((_, entry)) => entry.name_raw,
            None => make_83(name).map_err(|_| self.fail(Fat16Error::InvalidName))?,
        };

        let slot = match existing {
            Some((slot, _)) => slot,
            None => find_or_make_free_slot(&mut self.device, &self.geometry, parent).map_err(|e| self.fail(e))?,
        };

        let old_first_cluster = existing.map(|(_, entry)| entry.first_cluster).unwrap_or(0);
        let is_new_entry = existing.is_none();

        let new_first_cluster = if data.is_empty() {
            0
        } else {
            self.write_cluster_chain(data).map_err(|e| self.fail(e))?
        };

        let updated = DirEntry {
            name_raw: packed_name,
            attributes: ATTR_ARCHIVE,
            first_cluster: new_first_cluster,
            file_size: data.len() as u32,
        };
        if let Err(e) = write_entry_at(&mut self.device, slot, &updated, is_new_entry) {
            if new_first_cluster != 0 {
                let _ = free_chain(&mut self.device, &self.geometry, new_first_cluster);
            }
            return Err(self.fail(e));
        }

        if old_first_cluster != 0 {
            free_chain(&mut self.device, &self.geometry, old_first_cluster).map_err(|e| self.fail(e))?;
        }

        Ok(())
    }

    fn write_cluster_chain(&mut self, data: &[u8]) -> Result<u16, Fat16Error> {
        let bytes_per_cluster = self.geometry.bytes_per_cluster() as usize;
        let first = allocate_cluster(&mut self.device, &self.geometry)?;
        let mut cluster = first;
        let mut offset = 0usize;

        loop {
            let lba = self.geometry.cluster_to_lba(cluster);
            let mut remaining_in_cluster = bytes_per_cluster;
            let mut sector_offset = 0u32;

            while remaining_in_cluster > 0 {
                let mut sector = [0u8; SECTOR_SIZE];
                let take = (data.len() - offset).min(SECTOR_SIZE);
                if take > 0 {
                    sector[..take].copy_from_slice(&data[offset..offset + take]);
                }
                self.device
                    .write_sector(lba + sector_offset, &sector)
                    .map_err(|_| Fat16Error::Io)?;
                offset += take;
                remaining_in_cluster -= SECTOR_SIZE;
                sector_offset += 1;
            }

            if offset >= data.len() {
                return Ok(first);
            }

            cluster = match extend_chain(&mut self.device, &self.geometry, cluster) {
                Ok(next) => next,
                Err(e) => {
                    let _ = free_chain(&mut self.device, &self.geometry, first);
                    return Err(e);
                }
            };
        }
    }

    pub fn cat<'b>(&mut self, path: &str, buf: &'b mut [u8]) -> Result<&'b [u8], Fat16Error> {
        let n = self.read(path, buf)?;
        Ok(&buf[..n])
    }

    pub fn rm(&mut self, path: &str) -> Result<(), Fat16Error> {
        let (_, slot, entry) = self.find_file(path)?;

        if entry.first_cluster != 0 {
            free_chain(&mut self.device, &self.geometry, entry.first_cluster).map_err(|e| self.fail(e))?;
        }

        self.mark_slot_free(slot)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<(), Fat16Error> {
        let (parent, name) = self.resolve_parent_and_name(path)?;
        let (slot, entry) = find_entry_slot(&mut self.device, &self.geometry, parent, name)?
            .ok_or_else(|| self.fail(Fat16Error::NotFound))?;

        if !entry.is_directory() {
            return Err(self.fail(Fat16Error::NotADirectory));
        }
        if entry.first_cluster == 0 {
            return Err(self.fail(Fat16Error::InvalidName));
        }

        if !is_directory_empty(&mut self.device, &self.geometry, entry.first_cluster)
            .map_err(|e| self.fail(e))?
        {
            return Err(self.fail(Fat16Error::DirectoryNotEmpty));
        }

        free_chain(&mut self.device, &self.geometry, entry.first_cluster).map_err(|e| self.fail(e))?;

        self.mark_slot_free(slot)
    }

    fn mark_slot_free(&mut self, slot: EntrySlot) -> Result<(), Fat16Error> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.device.read_sector(slot.lba, &mut sector).map_err(|_| self.fail(Fat16Error::Io))?;
        sector[slot.index * DIR_ENTRY_SIZE] = dir_entry::FREE_MARKER;
        self.device.write_sector(slot.lba, &sector).map_err(|_| self.fail(Fat16Error::Io))
    }

    /// Report free/used space across the whole volume by walking the
    /// first FAT copy and counting free-cluster markers.
    pub fn df(&mut self) -> Result<VolumeSpace, Fat16Error> {
        let mut free_clusters = 0u32;
        let last_cluster = FIRST_DATA_CLUSTER as u32 + self.geometry.cluster_count;

        for cluster in FIRST_DATA_CLUSTER as u32..last_cluster {
            let entry = super::fat_table::read_entry(&mut self.device, &self.geometry, cluster as u16)
                .map_err(|e| self.fail(e))?;
            if entry == 0 {
                free_clusters += 1;
            }
        }

        let bytes_per_cluster = self.geometry.bytes_per_cluster() as u64;
        Ok(VolumeSpace {
            total_bytes: self.geometry.total_bytes(),
            free_bytes: free_clusters as u64 * bytes_per_cluster,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeSpace {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl VolumeSpace {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes - self.free_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MemoryBlockDevice;

    fn formatted_volume(total_sectors: u32) -> Fat16Volume<MemoryBlockDevice> {
        let bpb = Bpb {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sector_count: 1,
            fat_count: 2,
            root_entry_count: 16,
            total_sectors,
            sectors_per_fat: 1,
            hidden_sectors: 0,
        };
        let geometry = VolumeGeometry::new_unchecked(0, bpb).unwrap();
        let device = MemoryBlockDevice::new(total_sectors);
        Fat16Volume::mount_with_geometry(device, geometry)
    }

    #[test]
    fn touch_then_ls_then_cat_round_trips() {
        let mut vol = formatted_volume(64);
        vol.touch("hello.txt").unwrap();

        let mut entries = [DirEntry {
            name_raw: [0; 11],
            attributes: 0,
            first_cluster: 0,
            file_size: 0,
        }; 4];
        let n = vol.ls("", &mut entries).unwrap();
        assert_eq!(n, 1);

        vol.write("hello.txt", b"hi there").unwrap();
        let mut buf = [0u8; 64];
        let contents = vol.cat("hello.txt", &mut buf).unwrap();
        assert_eq!(contents, b"hi there");
    }

    #[test]
    fn mkdir_cd_pwd_round_trips() {
        let mut vol = formatted_volume(64);
        vol.mkdir("docs").unwrap();
        vol.cd("docs").unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(vol.pwd(&mut buf), "/DOCS");

        vol.touch("notes.txt").unwrap();
        vol.cd("..").unwrap();
        assert_eq!(vol.pwd(&mut buf), "/");

        // The file inside `docs` must still be reachable by absolute path.
        vol.write("/docs/notes.txt", b"abc").unwrap();
        let mut read_buf = [0u8; 16];
        assert_eq!(vol.cat("/docs/notes.txt", &mut read_buf).unwrap(), b"abc");
    }

    #[test]
    fn rmdir_refuses_non_empty_directory() {
        let mut vol = formatted_volume(64);
        vol.mkdir("docs").unwrap();
        vol.touch("/docs/a.txt").unwrap();
        assert_eq!(vol.rmdir("docs"), Err(Fat16Error::DirectoryNotEmpty));

        vol.rm("/docs/a.txt").unwrap();
        vol.rmdir("docs").unwrap();
    }

    #[test]
    fn touch_existing_name_fails() {
        let mut vol = formatted_volume(64);
        vol.touch("a.txt").unwrap();
        assert_eq!(vol.touch("a.txt"), Err(Fat16Error::AlreadyExists));
    }

    #[test]
    fn write_failure_leaves_old_data_reachable() {
        // Fill the disk so a second write (which needs a fresh chain)
        // cannot allocate, and confirm the original contents survive.
        let mut vol = formatted_volume(64);
        vol.touch("a.txt").unwrap();
        vol.write("a.txt", b"original").unwrap();

        while allocate_cluster(&mut vol.device, &vol.geometry).is_ok() {}

        assert_eq!(vol.write("a.txt", b"replacement"), Err(Fat16Error::DiskFull));
        let mut buf = [0u8; 16];
        assert_eq!(vol.cat("a.txt", &mut buf).unwrap(), b"original");
    }

    #[test]
    fn df_accounts_for_allocated_clusters() {
        let mut vol = formatted_volume(64);
        let before = vol.df().unwrap();
        vol.touch("a.txt").unwrap();
        vol.write("a.txt", &[1u8; 512]).unwrap();
        let after = vol.df().unwrap();
        assert!(after.free_bytes < before.free_bytes);
        assert_eq!(before.total_bytes, after.total_bytes);
    }

    #[test]
    fn rm_missing_file_reports_not_found() {
        let mut vol = formatted_volume(64);
        assert_eq!(vol.rm("missing.txt"), Err(Fat16Error::NotFound));
    }

    #[test]
    fn root_directory_full_is_reported() {
        let mut vol = formatted_volume(64);
        // root_entry_count is 16.
        for i in 0..16 {
            let name = match i {
                0..=9 => std::format!("f{}.txt", i),
                _ => std::format!("g{}.txt", i),
            };
            vol.touch(&name).unwrap();
        }
        assert_eq!(vol.touch("one_more.txt"), Err(Fat16Error::RootDirectoryFull));
    }
}
