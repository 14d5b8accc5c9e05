//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 여러 요청 간에 공유됩니다.
//! 데이터셋, 날짜 구간, 학습된 모델은 각각 별도의 RwLock으로 보호되며
//! 데이터 디렉토리에 영속화됩니다.
//!
//! 디스크 저장과 메모리 교체는 `commit_*` 메서드에서 `persist` 락을 잡은 채
//! 함께 수행됩니다. 따라서 디스크와 메모리의 데이터셋이 어긋나지 않고,
//! 이전 데이터셋으로 학습된 모델이 새 데이터셋 옆에 남지 않습니다.

use std::sync::Arc;

use inspect_core::{
    AppConfig, CoreError, CoreResult, Dataset, DatasetStore, RangeSet, DATASET_FILE,
};
use inspect_ml::{TrainedModel, MODEL_FILE};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 메모리에 올라와 있는 데이터셋과 원본 파일 이름.
#[derive(Debug)]
pub struct LoadedDataset {
    /// 업로드 시 클라이언트가 보낸 파일 이름
    pub file_name: String,
    pub dataset: Dataset,
}

/// 모델 반영 실패.
#[derive(Debug, Error)]
pub enum CommitError {
    /// 학습에 사용한 데이터셋이 그 사이 교체됨
    #[error("dataset was replaced while training")]
    DatasetChanged,

    /// 저장 실패
    #[error(transparent)]
    Storage(#[from] CoreError),
}

/// 블로킹 저장 작업을 실행합니다.
async fn blocking_io<T, F>(f: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Io(format!("storage task failed: {}", e)))?
}

/// 애플리케이션 공유 상태.
///
/// Axum의 State extractor를 통해 핸들러에 주입됩니다.
#[derive(Clone)]
pub struct AppState {
    /// 애플리케이션 설정
    pub config: Arc<AppConfig>,

    /// 데이터 디렉토리 저장소
    pub store: DatasetStore,

    /// 현재 데이터셋 (업로드 시 교체)
    pub dataset: Arc<RwLock<Option<Arc<LoadedDataset>>>>,

    /// 제출된 학습/테스트/시뮬레이션 구간
    pub ranges: Arc<RwLock<Option<RangeSet>>>,

    /// 최근 학습된 모델
    pub model: Arc<RwLock<Option<Arc<TrainedModel>>>>,

    /// 학습 직렬화 락. 동시에 하나의 학습만 허용합니다.
    pub training: Arc<Mutex<()>>,

    /// 저장 + 메모리 교체 직렬화 락
    persist: Arc<Mutex<()>>,

    /// Graceful shutdown 토큰 (시뮬레이션 스트림에 전파)
    pub shutdown: CancellationToken,

    /// 서버 시작 시간
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 빈 상태를 생성합니다.
    pub fn new(config: AppConfig) -> Self {
        let store = DatasetStore::new(config.storage.data_dir.clone());
        Self {
            config: Arc::new(config),
            store,
            dataset: Arc::new(RwLock::new(None)),
            ranges: Arc::new(RwLock::new(None)),
            model: Arc::new(RwLock::new(None)),
            training: Arc::new(Mutex::new(())),
            persist: Arc::new(Mutex::new(())),
            shutdown: CancellationToken::new(),
            started_at: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 데이터 디렉토리에 남아 있는 데이터셋, 구간, 모델을 다시 불러옵니다.
    ///
    /// 손상된 구간/모델 파일은 경고 후 무시합니다. 데이터셋 파싱 실패는
    /// 에러로 반환합니다.
    pub fn restore(config: AppConfig) -> CoreResult<Self> {
        let mut state = Self::new(config);
        state.store.ensure_dir()?;

        if let Some(dataset) = state.store.load_dataset()? {
            info!(
                rows = dataset.len(),
                features = dataset.schema.feature_columns.len(),
                "Restored dataset from data directory"
            );
            state.dataset = Arc::new(RwLock::new(Some(Arc::new(LoadedDataset {
                file_name: DATASET_FILE.to_string(),
                dataset,
            }))));
        }

        match state.store.load_ranges() {
            Ok(Some(ranges)) => {
                info!(train = %ranges.train, test = %ranges.test, sim = %ranges.simulation, "Restored date ranges");
                state.ranges = Arc::new(RwLock::new(Some(ranges)));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable date ranges"),
        }

        match state.store.load_json::<TrainedModel>(MODEL_FILE) {
            Ok(Some(model)) => {
                info!(model_id = %model.id, rounds = model.report.rounds, "Restored trained model");
                state.model = Arc::new(RwLock::new(Some(Arc::new(model))));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Ignoring unreadable model file"),
        }

        Ok(state)
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        chrono::Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
    }

    /// 현재 데이터셋.
    pub async fn current_dataset(&self) -> Option<Arc<LoadedDataset>> {
        self.dataset.read().await.clone()
    }

    /// 현재 모델.
    pub async fn current_model(&self) -> Option<Arc<TrainedModel>> {
        self.model.read().await.clone()
    }

    /// 저장된 구간.
    pub async fn current_ranges(&self) -> Option<RangeSet> {
        *self.ranges.read().await
    }

    /// 업로드 원본을 저장하고 데이터셋을 교체합니다.
    ///
    /// 이전 데이터셋으로 학습된 모델은 폐기되고 `model.json`도 삭제됩니다.
    /// 제출된 구간은 유지됩니다.
    pub async fn commit_upload(
        &self,
        bytes: Vec<u8>,
        loaded: LoadedDataset,
    ) -> CoreResult<Arc<LoadedDataset>> {
        let _persist = self.persist.lock().await;

        let store = self.store.clone();
        blocking_io(move || {
            store.save_upload(&bytes)?;
            if let Err(e) = store.remove(MODEL_FILE) {
                warn!(error = %e, "Failed to remove persisted model");
            }
            Ok(())
        })
        .await?;

        let loaded = Arc::new(loaded);
        *self.dataset.write().await = Some(loaded.clone());
        if let Some(model) = self.model.write().await.take() {
            info!(model_id = %model.id, "Discarding model trained on previous dataset");
        }
        Ok(loaded)
    }

    /// 학습된 모델을 저장하고 현재 모델로 설정합니다.
    ///
    /// `trained_on`이 더 이상 현재 데이터셋이 아니면 저장하지 않고
    /// [`CommitError::DatasetChanged`]를 반환합니다.
    pub async fn commit_model(
        &self,
        model: TrainedModel,
        trained_on: &Arc<LoadedDataset>,
    ) -> Result<Arc<TrainedModel>, CommitError> {
        let _persist = self.persist.lock().await;

        let still_current = self
            .current_dataset()
            .await
            .is_some_and(|current| Arc::ptr_eq(&current, trained_on));
        if !still_current {
            return Err(CommitError::DatasetChanged);
        }

        let store = self.store.clone();
        let model = blocking_io(move || store.save_json(MODEL_FILE, &model).map(|_| model)).await?;

        let model = Arc::new(model);
        *self.model.write().await = Some(model.clone());
        Ok(model)
    }

    /// 구간을 저장하고 교체합니다.
    pub async fn commit_ranges(&self, ranges: RangeSet) -> CoreResult<()> {
        let _persist = self.persist.lock().await;

        let store = self.store.clone();
        blocking_io(move || store.save_ranges(&ranges)).await?;
        *self.ranges.write().await = Some(ranges);
        Ok(())
    }
}

/// 테스트용 AppState 생성.
///
/// 임시 데이터 디렉토리를 사용하고, 학습 파라미터를 작은 데이터셋에 맞게 줄이며,
/// 시뮬레이션 간격을 0으로 둡니다.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> AppState {
    let mut config = AppConfig::default();
    config.storage.data_dir =
        std::env::temp_dir().join(format!("inspect-api-{}", uuid::Uuid::new_v4()));
    config.training.n_estimators = 20;
    config.training.min_samples_leaf = 3;
    config.simulation.interval_ms = 0;
    AppState::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspect_core::DateRange;
    use inspect_ml::{BoosterConfig, Trainer, TrainingRequest};

    const CSV: &str = "Id,Timestamp,Temp,Response\n\
        A1,2021-01-01 00:00:00,10,0\n\
        A2,2021-01-02 00:00:00,90,1\n";

    /// 1월 학습, 2월 테스트용. Temp > 50 이면 불량.
    const TRAIN_CSV: &str = "Id,Timestamp,Temp,Response\n\
        A1,2021-01-01 00:00:00,10,0\n\
        A2,2021-01-02 00:00:00,90,1\n\
        A3,2021-01-03 00:00:00,20,0\n\
        A4,2021-01-04 00:00:00,80,1\n\
        A5,2021-01-05 00:00:00,30,0\n\
        A6,2021-01-06 00:00:00,70,1\n\
        B1,2021-02-01 00:00:00,15,0\n\
        B2,2021-02-02 00:00:00,85,1\n";

    fn train_loaded(name: &str) -> LoadedDataset {
        LoadedDataset {
            file_name: name.to_string(),
            dataset: Dataset::from_bytes(TRAIN_CSV.as_bytes()).unwrap(),
        }
    }

    fn train(loaded: &LoadedDataset) -> TrainedModel {
        let d = |s: &str| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let request = TrainingRequest {
            train: DateRange::new(d("2021-01-01"), d("2021-01-31")),
            test: DateRange::new(d("2021-02-01"), d("2021-02-28")),
        };
        let config = BoosterConfig::default()
            .with_estimators(3)
            .with_min_samples_leaf(1);
        Trainer::new(config).train(&loaded.dataset, &request).unwrap()
    }

    fn loaded(name: &str) -> LoadedDataset {
        LoadedDataset {
            file_name: name.to_string(),
            dataset: Dataset::from_bytes(CSV.as_bytes()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_commit_upload_discards_model_file() {
        let state = create_test_state();
        state.store.save_json(MODEL_FILE, &serde_json::json!({"stale": true})).unwrap();
        assert!(state.store.path(MODEL_FILE).exists());

        state
            .commit_upload(CSV.as_bytes().to_vec(), loaded("line.csv"))
            .await
            .unwrap();

        assert!(!state.store.path(MODEL_FILE).exists());
        assert!(state.store.path(DATASET_FILE).exists());
        assert!(state.current_model().await.is_none());
        assert_eq!(state.current_dataset().await.unwrap().file_name, "line.csv");

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_commit_model_rejects_replaced_dataset() {
        let state = create_test_state();
        let first = state
            .commit_upload(TRAIN_CSV.as_bytes().to_vec(), train_loaded("first.csv"))
            .await
            .unwrap();
        let model = train(&first);

        // 학습이 끝나기 전에 새 데이터셋이 올라온 상황
        state
            .commit_upload(TRAIN_CSV.as_bytes().to_vec(), train_loaded("second.csv"))
            .await
            .unwrap();

        let err = state.commit_model(model, &first).await.unwrap_err();
        assert!(matches!(err, CommitError::DatasetChanged));
        assert!(state.current_model().await.is_none());
        assert!(!state.store.path(MODEL_FILE).exists());

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_commit_model_persists_for_current_dataset() {
        let state = create_test_state();
        let current = state
            .commit_upload(TRAIN_CSV.as_bytes().to_vec(), train_loaded("line.csv"))
            .await
            .unwrap();
        let model = train(&current);
        let id = model.id;

        let committed = state.commit_model(model, &current).await.unwrap();
        assert_eq!(committed.id, id);
        assert_eq!(state.current_model().await.unwrap().id, id);
        assert!(state.store.path(MODEL_FILE).exists());

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_keep_disk_and_memory_in_sync() {
        let state = Arc::new(create_test_state());
        let csv_for = |tag: &str| format!("Id,Timestamp,Temp,Response\n{},2021-01-01 00:00:00,10,0\n", tag);

        let mut handles = Vec::new();
        for i in 0..8 {
            let state = state.clone();
            let csv = csv_for(&format!("U{}", i));
            handles.push(tokio::spawn(async move {
                let dataset = Dataset::from_bytes(csv.as_bytes()).unwrap();
                state
                    .commit_upload(
                        csv.into_bytes(),
                        LoadedDataset {
                            file_name: format!("u{}.csv", i),
                            dataset,
                        },
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let on_disk = state.store.load_dataset().unwrap().unwrap();
        let in_memory = state.current_dataset().await.unwrap();
        assert_eq!(on_disk.fingerprint, in_memory.dataset.fingerprint);

        let _ = std::fs::remove_dir_all(state.store.root());
    }

    #[tokio::test]
    async fn test_restore_reloads_dataset_and_ranges() {
        let state = create_test_state();
        state.store.save_upload(CSV.as_bytes()).unwrap();
        let d = |s: &str| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let ranges = RangeSet {
            train: DateRange::new(d("2021-01-01"), d("2021-01-01")),
            test: DateRange::new(d("2021-01-02"), d("2021-01-02")),
            simulation: DateRange::new(d("2021-01-02"), d("2021-01-02")),
        };
        state.store.save_ranges(&ranges).unwrap();
        // 손상된 모델 파일은 무시
        std::fs::write(state.store.path(MODEL_FILE), b"{not json").unwrap();

        let restored = AppState::restore((*state.config).clone()).unwrap();
        let loaded = restored.current_dataset().await.unwrap();
        assert_eq!(loaded.file_name, DATASET_FILE);
        assert_eq!(loaded.dataset.len(), 2);
        assert_eq!(restored.current_ranges().await, Some(ranges));
        assert!(restored.current_model().await.is_none());

        let _ = std::fs::remove_dir_all(state.store.root());
    }
}
