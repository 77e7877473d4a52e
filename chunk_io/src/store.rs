//! Scene storage and dataset split manifest.
//!
//! A [`SceneStore`] keeps one `.scene` file per scene in a flat directory,
//! named after the scene. An optional `splits.json` manifest in the same
//! directory records which scenes belong to the train, val and test splits.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chunk_core::Scene;
use serde::{Deserialize, Serialize};

use crate::error::{ChunkIoError, Result};
use crate::format;

/// File extension of stored scenes.
pub const SCENE_EXT: &str = "scene";

/// File name of the split manifest inside a store directory.
pub const MANIFEST_FILE: &str = "splits.json";

/// Directory-backed store of named scenes.
#[derive(Debug, Clone)]
pub struct SceneStore {
    root: PathBuf,
}

impl SceneStore {
    /// Opens a store at `root`, creating the directory if needed.
    pub fn create<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Opens an existing store directory.
    pub fn open<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ChunkIoError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("scene store directory {} does not exist", root.display()),
            )));
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Saves a scene under its own name, replacing any previous version.
    pub fn save(&self, scene: &Scene) -> Result<()> {
        validate_name(&scene.name)?;
        let path = self.scene_path(&scene.name);

        let mut writer = BufWriter::new(File::create(&path)?);
        format::save_scene(scene, &mut writer)?;
        writer.flush()?;

        log::debug!("saved scene {} ({} points)", scene.name, scene.len());
        Ok(())
    }

    /// Loads a scene by name.
    ///
    /// # Errors
    /// Returns [`SceneNotFound`](ChunkIoError::SceneNotFound) if no file
    /// exists for `name` and [`CorruptEntry`](ChunkIoError::CorruptEntry)
    /// if the file does not decode.
    pub fn load(&self, name: &str) -> Result<Scene> {
        validate_name(name)?;
        let path = self.scene_path(name);

        let file = File::open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ChunkIoError::SceneNotFound {
                    name: name.to_string(),
                    path: path.clone(),
                }
            } else {
                err.into()
            }
        })?;
        let mut reader = BufReader::new(file);
        format::load_scene(&mut reader, name).map_err(|err| err.at_path(&path))
    }

    /// Whether a scene with `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        validate_name(name).is_ok() && self.scene_path(name).exists()
    }

    /// Names of all stored scenes in ascending order.
    pub fn scene_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SCENE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort_unstable();
        Ok(names)
    }

    /// Loads the split manifest stored next to the scenes.
    pub fn manifest(&self) -> Result<SplitManifest> {
        SplitManifest::load(self.root.join(MANIFEST_FILE))
    }

    /// Writes the split manifest next to the scenes.
    pub fn save_manifest(&self, manifest: &SplitManifest) -> Result<()> {
        manifest.save(self.root.join(MANIFEST_FILE))
    }

    /// Whether a split manifest is present.
    pub fn has_manifest(&self) -> bool {
        self.root.join(MANIFEST_FILE).is_file()
    }

    fn scene_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, SCENE_EXT))
    }
}

/// Scene names assigned to each dataset split.
///
/// Stored as `splits.json`; absent splits deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitManifest {
    /// Training scenes.
    #[serde(default)]
    pub train: Vec<String>,
    /// Validation scenes.
    #[serde(default)]
    pub val: Vec<String>,
    /// Held-out test scenes.
    #[serde(default)]
    pub test: Vec<String>,
}

impl SplitManifest {
    /// Reads a manifest from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(|err| {
            ChunkIoError::InvalidManifest {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })
    }

    /// Writes the manifest as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|err| {
            ChunkIoError::InvalidManifest {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })?;
        writer.flush()?;
        Ok(())
    }

    /// Scenes of a split selected by name (`"train"`, `"val"` or `"test"`).
    pub fn split(&self, name: &str) -> Option<&[String]> {
        match name {
            "train" => Some(&self.train),
            "val" => Some(&self.val),
            "test" => Some(&self.test),
            _ => None,
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.contains('/')
        || name.contains('\\')
        || name.contains("..")
        || name.starts_with('.');
    if bad {
        return Err(ChunkIoError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_core::Point3;
    use tempfile::TempDir;

    fn make_test_scene(name: &str, n: usize) -> Scene {
        let points: Vec<Point3> = (0..n).map(|i| Point3::new(i as f32, 0.0, 1.0)).collect();
        let colors = vec![[200, 100, 50]; n];
        let normals = vec![Point3::new(0.0, 1.0, 0.0); n];
        let labels: Vec<i32> = (0..n).map(|i| (i % 3) as i32).collect();
        Scene::with_labels(name, points, colors, normals, labels)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        let scene = make_test_scene("room_00", 32);
        store.save(&scene).unwrap();

        let loaded = store.load("room_00").unwrap();
        assert_eq!(loaded, scene);
    }

    #[test]
    fn test_unlabeled_scene_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        let scene = Scene::new(
            "bare",
            vec![Point3::new(1.0, 2.0, 3.0)],
            vec![[0, 0, 0]],
            vec![Point3::new(0.0, 0.0, 1.0)],
        );
        store.save(&scene).unwrap();

        let loaded = store.load("bare").unwrap();
        assert!(!loaded.has_labels());
        assert_eq!(loaded, scene);
    }

    #[test]
    fn test_missing_scene() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        let result = store.load("ghost");
        assert!(matches!(result, Err(ChunkIoError::SceneNotFound { .. })));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        for name in ["../evil", "a/b", "a\\b", "", ".hidden"] {
            let result = store.load(name);
            assert!(
                matches!(result, Err(ChunkIoError::InvalidName { .. })),
                "expected rejection for {:?}",
                name
            );
        }
    }

    #[test]
    fn test_scene_names_sorted() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        for name in ["zeta", "alpha", "mid"] {
            store.save(&make_test_scene(name, 4)).unwrap();
        }
        // Non-scene files are ignored.
        std::fs::write(dir.path().join(MANIFEST_FILE), b"{}").unwrap();

        let names = store.scene_names().unwrap();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();
        assert!(!store.has_manifest());

        let manifest = SplitManifest {
            train: vec!["a".to_string(), "b".to_string()],
            val: vec!["c".to_string()],
            test: vec![],
        };
        store.save_manifest(&manifest).unwrap();

        assert!(store.has_manifest());
        assert_eq!(store.manifest().unwrap(), manifest);
        assert_eq!(manifest.split("val").unwrap(), &["c".to_string()]);
        assert!(manifest.split("dev").is_none());
    }

    #[test]
    fn test_manifest_missing_fields_default_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, br#"{"train": ["only"]}"#).unwrap();

        let manifest = SplitManifest::load(&path).unwrap();
        assert_eq!(manifest.train, vec!["only".to_string()]);
        assert!(manifest.val.is_empty());
        assert!(manifest.test.is_empty());
    }

    #[test]
    fn test_manifest_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, b"not json").unwrap();

        let result = SplitManifest::load(&path);
        assert!(matches!(result, Err(ChunkIoError::InvalidManifest { .. })));
    }

    #[test]
    fn test_overwrite_allowed() {
        let dir = TempDir::new().unwrap();
        let store = SceneStore::create(dir.path()).unwrap();

        store.save(&make_test_scene("room", 4)).unwrap();
        let bigger = make_test_scene("room", 8);
        store.save(&bigger).unwrap();

        assert_eq!(store.load("room").unwrap(), bigger);
    }
}
