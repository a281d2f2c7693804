//
// Copyright 2018 Tamas Blummer
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//!
//! # the page cache over the body file
//!
//! Pages are never freed or moved; `filesize` only grows. Residence is
//! capped; eviction picks a uniformly random resident page and flushes it
//! before dropping it, rather than tracking recency. Random eviction beats
//! LRU here because bucket scans walk pages with near-zero re-reference.
//!
use error::SpotResult;
use page::Page;

use rand::Rng;

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// allocates and caches pages on the body file
pub struct PageManager {
    file: File,
    filesize: u64,
    page_size: usize,
    max_resident: usize,
    resident: HashMap<u64, Page>,
}

impl PageManager {
    /// open a page manager over an already-sized body file
    pub fn open(file: File, page_size: usize, max_resident: usize) -> SpotResult<PageManager> {
        let filesize = file.metadata()?.len();
        Ok(PageManager { file, filesize, page_size, max_resident, resident: HashMap::new() })
    }

    /// authoritative size of the body file; not the same as the OS-visible
    /// file length until `save_all` has flushed
    pub fn filesize(&self) -> u64 {
        self.filesize
    }

    /// the page size this manager was configured with
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// return the resident page at `offset`, fetching it from disk first if
    /// it is not already cached
    pub fn fetch_page(&mut self, offset: u64) -> SpotResult<&mut Page> {
        if !self.resident.contains_key(&offset) {
            self.load_from_disk(offset)?;
        }
        Ok(self.resident.get_mut(&offset).expect("just inserted"))
    }

    /// allocate a new, empty page at the end of the body file and return its offset
    pub fn allocate_page(&mut self) -> SpotResult<u64> {
        self.evict_if_needed()?;
        let offset = self.filesize;
        let page = Page::new_empty(offset, self.page_size);
        let encoded = page.encode()?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(&encoded)?;
        self.filesize += self.page_size as u64;
        debug!("allocated page at offset {}", offset);
        // mark dirty so it survives an eviction before the caller mutates it
        self.resident.insert(offset, page);
        Ok(offset)
    }

    /// write every dirty resident page back to disk
    pub fn save_all(&mut self) -> SpotResult<()> {
        let offsets: Vec<u64> = self.resident.keys().cloned().collect();
        for offset in offsets {
            self.flush_one(offset)?;
        }
        self.file.flush()?;
        Ok(())
    }

    fn load_from_disk(&mut self, offset: u64) -> SpotResult<()> {
        self.evict_if_needed()?;
        let mut buf = vec![0u8; self.page_size];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        let page = Page::decode(&buf, offset, self.page_size)?;
        self.resident.insert(offset, page);
        Ok(())
    }

    fn flush_one(&mut self, offset: u64) -> SpotResult<()> {
        if let Some(page) = self.resident.get_mut(&offset) {
            if page.dirty {
                let encoded = page.encode()?;
                self.file.seek(SeekFrom::Start(offset))?;
                self.file.write_all(&encoded)?;
                page.dirty = false;
            }
        }
        Ok(())
    }

    fn evict_if_needed(&mut self) -> SpotResult<()> {
        if self.resident.len() < self.max_resident {
            return Ok(());
        }
        let keys: Vec<u64> = self.resident.keys().cloned().collect();
        let victim = keys[rand::thread_rng().gen_range(0, keys.len())];
        trace!("evicting page at offset {}", victim);
        self.flush_one(victim)?;
        self.resident.remove(&victim);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use codec::encode_line;
    use tempfile::tempdir;

    fn open_manager_at(path: &std::path::Path, max_resident: usize) -> PageManager {
        if !path.exists() {
            File::create(path).unwrap();
        }
        let file = std::fs::OpenOptions::new().read(true).write(true).open(path).unwrap();
        PageManager::open(file, 4096, max_resident).unwrap()
    }

    fn open_manager(max_resident: usize) -> (PageManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("body.spot");
        (open_manager_at(&path, max_resident), dir)
    }

    #[test]
    fn allocate_grows_filesize() {
        let (mut mgr, _dir) = open_manager(32);
        assert_eq!(mgr.filesize(), 0);
        let a = mgr.allocate_page().unwrap();
        let b = mgr.allocate_page().unwrap();
        assert_eq!(a, 0);
        assert_eq!(b, 4096);
        assert_eq!(mgr.filesize(), 8192);
    }

    #[test]
    fn fetch_after_reopen_sees_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("body.spot");

        let mut mgr = open_manager_at(&path, 32);
        let offset = mgr.allocate_page().unwrap();
        {
            let page = mgr.fetch_page(offset).unwrap();
            page.insert_line(encode_line(1, 2, 0).unwrap());
        }
        mgr.save_all().unwrap();
        drop(mgr);

        let mut mgr2 = open_manager_at(&path, 32);
        assert_eq!(mgr2.filesize(), 4096);
        let page = mgr2.fetch_page(offset).unwrap();
        assert_eq!(page.decoded_lines(), vec![(1, 2, 0)]);
    }

    #[test]
    fn eviction_respects_cap() {
        let (mut mgr, _dir) = open_manager(2);
        let a = mgr.allocate_page().unwrap();
        let b = mgr.allocate_page().unwrap();
        let c = mgr.allocate_page().unwrap();
        assert!(mgr.resident.len() <= 2);
        // all three pages must still be readable after eviction + reload
        for offset in &[a, b, c] {
            assert!(mgr.fetch_page(*offset).is_ok());
        }
    }
}
