use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::json;

use crate::cli::SubCommandExtend;
use crate::config::{BedrockOptions, Opts, PipelineOptions, StoreOptions};
use crate::searcher::{SearchOutcome, Searcher};

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub store: StoreOptions,
    #[command(flatten)]
    pub bedrock: BedrockOptions,
    #[command(flatten)]
    pub pipeline: PipelineOptions,
    /// 被搜索的图片路径
    pub image: PathBuf,
    /// 与图片一起参与向量嵌入的描述文本
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        let bytes = tokio::fs::read(&self.image).await?;
        let searcher = Searcher::connect(&self.store, &self.bedrock, &self.pipeline).await?;
        let outcome = searcher.search_bytes(&bytes, self.text.as_deref()).await?;
        print_result(&outcome, self)
    }
}

fn print_result(outcome: &SearchOutcome, opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            let candidates = outcome
                .candidates
                .iter()
                .map(|c| json!({ "id": c.id, "size": c.image.len() }))
                .collect::<Vec<_>>();
            let result = json!({ "description": outcome.description, "candidates": candidates });
            println!("{}", serde_json::to_string_pretty(&result)?)
        }
        OutputFormat::Table => {
            for (i, c) in outcome.candidates.iter().enumerate() {
                println!("{}\t{}\t{}", i + 1, c.id.as_deref().unwrap_or("-"), c.image.len());
            }
            println!();
            println!("{}", outcome.description);
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone)]
pub enum OutputFormat {
    Json,
    Table,
}
