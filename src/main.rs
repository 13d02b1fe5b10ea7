use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use persona_rec::{
    factory::AppFactory, ConversationRecord, InteractionStore, RecommendError, UserId,
};
use tracing_subscriber::EnvFilter;

mod cli;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let args = cli::Args::parse();
    let paths = AppFactory::get_paths()?;
    let config = AppFactory::create_config(&paths)?;

    match args.command {
        cli::Command::Recommend {
            user,
            alpha,
            k,
            explain,
        } => {
            let store = AppFactory::create_store(&paths)?;
            let recommender = Arc::new(AppFactory::create_recommender(&paths, &config, store)?);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start runtime")?;
            let result = runtime.block_on(recommender.recommend_async(UserId::from(user), alpha, k));

            match result {
                Ok(set) if explain => println!("{}", serde_json::to_string_pretty(&set)?),
                Ok(set) => println!("{}", serde_json::to_string_pretty(&set.ids())?),
                Err(RecommendError::EmbeddingUnavailable) => {
                    log::warn!("recommendations are disabled: embedding model unavailable");
                    println!("[]");
                }
                Err(e) => return Err(e).context("recommendation failed"),
            }
            Ok(())
        }

        cli::Command::Personas {} => {
            let registry = AppFactory::create_registry(&config)?;
            println!("{}", serde_json::to_string_pretty(&registry.summaries())?);
            Ok(())
        }

        cli::Command::Log {
            user,
            persona,
            role,
            content,
        } => {
            let registry = AppFactory::create_registry(&config)?;
            if !registry.contains(&persona) {
                bail!(
                    "unknown persona {persona}; available: {}",
                    registry.ids().collect::<Vec<_>>().join(", ")
                );
            }

            let store = AppFactory::create_store(&paths)?;
            let record = ConversationRecord {
                user_id: UserId::from(user),
                persona_id: persona,
                role,
                content,
                timestamp: Utc::now(),
            };
            store.append(record.clone())?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        cli::Command::History {
            user,
            persona,
            limit,
        } => {
            let store = AppFactory::create_store(&paths)?;
            let user_id = UserId::from(user);

            let messages = match persona {
                Some(persona) => store.recent_messages(&user_id, &persona, limit)?,
                None => {
                    let mut messages = store.user_messages(&user_id)?;
                    messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                    messages.truncate(limit);
                    messages
                }
            };

            println!("{}", serde_json::to_string_pretty(&messages)?);
            Ok(())
        }
    }
}
