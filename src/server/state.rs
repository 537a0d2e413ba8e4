use std::sync::Arc;

use crate::searcher::Searcher;

/// 应用状态
pub struct AppState {
    /// 搜索流水线，内部持有数据库连接池和模型客户端
    pub searcher: Searcher,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(searcher: Searcher) -> Arc<Self> {
        Arc::new(AppState { searcher })
    }
}
