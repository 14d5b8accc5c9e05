//! 데이터 디렉토리 저장소.
//!
//! 업로드 원본(`latest.csv`), 제출된 날짜 구간(`date_ranges.json`),
//! 학습된 모델 등 JSON 산출물을 한 디렉토리에 보관합니다.
//! 모든 쓰기는 임시 파일에 쓴 뒤 rename 합니다.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{Dataset, RangeSet};
use crate::error::{CoreError, CoreResult};

/// 업로드 원본 파일 이름.
pub const DATASET_FILE: &str = "latest.csv";
/// 날짜 구간 파일 이름.
pub const RANGES_FILE: &str = "date_ranges.json";

/// 파일 기반 저장소.
#[derive(Debug, Clone)]
pub struct DatasetStore {
    root: PathBuf,
}

impl DatasetStore {
    /// 저장소를 생성합니다. 디렉토리는 첫 쓰기 시 생성됩니다.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 저장소 루트 경로.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 저장소 파일 경로.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 디렉토리가 없으면 생성합니다.
    pub fn ensure_dir(&self) -> CoreResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// 쓰기 가능한 상태인지 확인합니다 (헬스 체크용).
    pub fn is_writable(&self) -> bool {
        if self.ensure_dir().is_err() {
            return false;
        }
        fs::metadata(&self.root)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> CoreResult<()> {
        self.ensure_dir()?;
        let target = self.path(name);
        let tmp = self.path(&format!("{}.tmp", name));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &target)?;
        debug!(path = %target.display(), bytes = bytes.len(), "File written");
        Ok(())
    }

    fn read_optional(&self, name: &str) -> CoreResult<Option<Vec<u8>>> {
        match fs::read(self.path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 업로드 원본을 저장합니다.
    pub fn save_upload(&self, bytes: &[u8]) -> CoreResult<()> {
        self.write_atomic(DATASET_FILE, bytes)?;
        info!(path = %self.path(DATASET_FILE).display(), "Dataset persisted");
        Ok(())
    }

    /// 저장된 데이터셋을 다시 파싱합니다.
    pub fn load_dataset(&self) -> CoreResult<Option<Dataset>> {
        match self.read_optional(DATASET_FILE)? {
            Some(bytes) => Dataset::from_bytes(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// 날짜 구간을 저장합니다.
    pub fn save_ranges(&self, ranges: &RangeSet) -> CoreResult<()> {
        self.save_json(RANGES_FILE, ranges)
    }

    /// 저장된 날짜 구간을 읽습니다.
    pub fn load_ranges(&self) -> CoreResult<Option<RangeSet>> {
        self.load_json(RANGES_FILE)
    }

    /// 값을 JSON으로 저장합니다.
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> CoreResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_atomic(name, &bytes)
    }

    /// JSON 파일을 읽습니다. 파일이 없으면 `None`.
    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> CoreResult<Option<T>> {
        match self.read_optional(name)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CoreError::Serialization(format!("{}: {}", name, e))),
            None => Ok(None),
        }
    }

    /// 파일을 삭제합니다. 없으면 무시합니다.
    pub fn remove(&self, name: &str) -> CoreResult<()> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateRange;
    use chrono::NaiveDate;

    fn temp_store() -> DatasetStore {
        let dir = std::env::temp_dir().join(format!("inspect-store-{}", uuid::Uuid::new_v4()));
        DatasetStore::new(dir)
    }

    #[test]
    fn test_missing_files_are_none() {
        let store = temp_store();
        assert!(store.load_dataset().unwrap().is_none());
        assert!(store.load_ranges().unwrap().is_none());
        assert!(store.load_json::<serde_json::Value>("model.json").unwrap().is_none());
    }

    #[test]
    fn test_upload_roundtrip() {
        let store = temp_store();
        store
            .save_upload(b"Timestamp,F1,Response\n2021-01-01,1.0,1\n")
            .unwrap();
        let ds = store.load_dataset().unwrap().unwrap();
        assert_eq!(ds.len(), 1);
        assert!(!store.path("latest.csv.tmp").exists());
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_ranges_roundtrip() {
        let store = temp_store();
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let ranges = RangeSet {
            train: DateRange::new(d("2021-01-01"), d("2021-01-10")),
            test: DateRange::new(d("2021-01-11"), d("2021-01-20")),
            simulation: DateRange::new(d("2021-01-21"), d("2021-01-31")),
        };
        store.save_ranges(&ranges).unwrap();
        assert_eq!(store.load_ranges().unwrap(), Some(ranges));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_corrupt_json_is_serialization_error() {
        let store = temp_store();
        store.ensure_dir().unwrap();
        fs::write(store.path(RANGES_FILE), b"{not json").unwrap();
        let err = store.load_ranges().unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
        let _ = fs::remove_dir_all(store.root());
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let store = temp_store();
        assert!(store.remove("model.json").is_ok());
    }
}
