// SPDX-License-Identifier: MIT

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use voseq::config::BlastConfig;
use voseq::errors::VoseqError;
use voseq::flickr::{PhotoHost, PhotoInfo};
use voseq::records::{Sequence, Voucher};
use voseq::store::Store;

/// A temporary on-disk store plus the directories the builder and the image pipeline write to.
/// Everything is removed when the rig is dropped.
pub struct Rig {
    pub dir: TempDir,
    pub store: Store,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Rig {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let store = Store::create(dir.path().join("voseq.sqlite3")).expect("creating store");
        Rig { dir, store }
    }

    pub fn blast_config(&self) -> BlastConfig {
        BlastConfig {
            db_dir: self.dir.path().join("blast_db"),
            bin_dir: None,
        }
    }

    pub fn media_root(&self) -> PathBuf {
        let root = self.dir.path().join("media");
        std::fs::create_dir_all(&root).expect("creating media root");
        root
    }

    pub fn seed_voucher(&mut self, code: &str) -> Voucher {
        let mut voucher = Voucher::new(code);
        voucher.genus = String::from("Euptychia");
        voucher.species = String::from("ordinata");
        voucher.family = String::from("Nymphalidae");
        voucher.country = String::from("PERU");
        self.store.save_voucher(&mut voucher).expect("saving voucher");
        voucher
    }

    pub fn seed_sequence(&mut self, code: &str, gene_code: &str, text: &str) -> Sequence {
        let mut sequence = Sequence::new(code, gene_code, text);
        self.store
            .save_sequence(&mut sequence)
            .expect("saving sequence");
        sequence
    }
}

/// Photo host that answers from a script instead of the network, recording every call.
pub struct ScriptedHost {
    pub photo_id: String,
    pub info: PhotoInfo,
    pub uploads: RefCell<Vec<String>>,
    pub info_fetches: RefCell<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedHost {
    pub fn new(photo_id: &str) -> ScriptedHost {
        ScriptedHost {
            photo_id: photo_id.to_string(),
            info: PhotoInfo {
                page_url: format!("https://www.flickr.com/photos/voseq/{}/", photo_id),
                farm: 9,
                server: String::from("8237"),
                secret: String::from("abc123"),
            },
            uploads: RefCell::new(Vec::new()),
            info_fetches: RefCell::new(Vec::new()),
        }
    }
}

impl PhotoHost for ScriptedHost {
    fn upload(
        &self,
        file: &Path,
        title: &str,
        _description: &str,
        _tags: &str,
    ) -> Result<String, VoseqError> {
        self.uploads
            .borrow_mut()
            .push(format!("{} ({})", file.display(), title));
        Ok(self.photo_id.clone())
    }

    fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, VoseqError> {
        self.info_fetches.borrow_mut().push(photo_id.to_string());
        Ok(self.info.clone())
    }
}
