use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use log::info;
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};

mod search;

pub use search::*;

use crate::config::StoreOptions;

/// 连接 MongoDB 并确认集群可用
///
/// 返回的 [`Database`] 内部持有连接池，可以在多个请求之间共享。
pub async fn init_db(opts: &StoreOptions, timeout: Duration) -> Result<Database> {
    let mut options = ClientOptions::parse(&opts.mongodb_uri).await?;
    options.connect_timeout = Some(timeout);
    options.server_selection_timeout = Some(timeout);
    options.app_name.get_or_insert_with(|| "lookalike".to_string());

    let client = Client::with_options(options)?;
    let db = match &opts.database {
        Some(name) => client.database(name),
        None => client.default_database().ok_or_else(|| anyhow!("连接字符串中没有指定数据库"))?,
    };
    info!("初始化数据库连接: {}", db.name());

    let pong = db.run_command(doc! { "ping": 1 }).await?;
    if !ping_ok(&pong) {
        bail!("集群连接状态异常: {pong}");
    }
    info!("已连接到 MongoDB");

    Ok(db)
}

/// `ping` 命令的返回中 `ok` 是否为 1
fn ping_ok(pong: &Document) -> bool {
    match pong.get("ok") {
        Some(Bson::Double(v)) => *v == 1.0,
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        _ => false,
    }
}
