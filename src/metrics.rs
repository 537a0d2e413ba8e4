use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, error};
use prometheus::*;
use tokio::task::spawn_blocking;

use crate::error::Stage;

static METRIC_SEARCH_REQUEST_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lookalike_search_request_count",
        "count of search requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

static METRIC_STAGE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "lookalike_stage_duration",
        "duration of each pipeline stage in seconds",
        &["stage"]
    )
    .unwrap()
});

static METRIC_CANDIDATE_COUNT: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "lookalike_candidate_count",
        "number of candidates returned by vector search",
        vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0]
    )
    .unwrap()
});

/// 记录一次请求的结果，`outcome` 为 `ok` 或错误类别
pub fn inc_request_count(outcome: &str) {
    METRIC_SEARCH_REQUEST_COUNT.with_label_values(&[outcome]).inc();
}

pub fn observe_stage_duration(stage: Stage, duration: f32) {
    METRIC_STAGE_DURATION.with_label_values(&[stage.as_str()]).observe(duration as f64);
}

pub fn observe_candidate_count(count: usize) {
    METRIC_CANDIDATE_COUNT.observe(count as f64);
}

/// Pushgateway 推送目标
#[derive(Debug, Clone)]
pub struct PushTarget {
    pub url: String,
    pub instance: String,
    pub auth: Option<(String, String)>,
}

impl PushTarget {
    /// 推送一次当前进程的全部指标
    pub fn push(&self) -> Result<()> {
        let auth = self
            .auth
            .clone()
            .map(|(username, password)| BasicAuthentication { username, password });
        push_metrics(
            "lookalike",
            labels! { "instance".to_string() => self.instance.clone() },
            &self.url,
            gather(),
            auth,
        )
    }
}

/// 在后台按固定间隔推送指标，失败只记录日志
pub fn spawn_push(target: PushTarget, interval: Duration) {
    tokio::spawn(async move {
        loop {
            let t = target.clone();
            match spawn_blocking(move || t.push()).await {
                Ok(Ok(())) => debug!("已推送指标到 {}", target.url),
                Ok(Err(e)) => error!("推送指标失败: {e}"),
                Err(e) => error!("推送指标任务异常: {e}"),
            }
            tokio::time::sleep(interval).await;
        }
    });
}
