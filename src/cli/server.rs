use std::time::Duration;

use clap::Parser;
use log::info;
use tokio::net::TcpListener;

use crate::cli::SubCommandExtend;
use crate::config::{BedrockOptions, PipelineOptions, StoreOptions};
use crate::{Opts, Searcher, metrics, server};

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    #[command(flatten)]
    pub store: StoreOptions,
    #[command(flatten)]
    pub bedrock: BedrockOptions,
    #[command(flatten)]
    pub pipeline: PipelineOptions,
    /// 监听地址
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    /// 监听端口
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,
    /// prometheus 主动推送地址
    #[arg(long, value_name = "URL")]
    pub prometheus_push: Option<String>,
    /// 自定义 instance 标签值
    #[arg(long, value_name = "NAME")]
    pub prometheus_instance: Option<String>,
    /// prometheus 认证信息，格式为 username:password
    #[arg(long, value_name = "AUTH", value_parser = parse_auth)]
    pub prometheus_auth: Option<(String, String)>,
}

impl SubCommandExtend for ServerCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let searcher = Searcher::connect(&self.store, &self.bedrock, &self.pipeline).await?;

        // 创建应用状态
        let state = server::AppState::new(searcher);

        // 创建应用
        let app = server::create_app(state);

        let addr = format!("{}:{}", self.host, self.port);

        if let Some(url) = self.prometheus_push.clone() {
            let target = metrics::PushTarget {
                url,
                instance: self.prometheus_instance.clone().unwrap_or_else(|| addr.clone()),
                auth: self.prometheus_auth.clone(),
            };
            metrics::spawn_push(target, Duration::from_secs(30));
        }

        // 启动服务器
        info!("服务器启动：http://{}", &addr);
        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

fn parse_auth(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((username, password)) => Ok((username.to_string(), password.to_string())),
        None => Err(format!("无效的认证信息: {s}")),
    }
}
