use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL wins; otherwise fall back to the service's config.yaml
    if env::var("DATABASE_URL").is_err() {
        let settings = match Config::builder()
            .add_source(config::File::with_name("config.yaml").required(false))
            .build()
        {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Failed to read config.yaml: {e}");
                std::process::exit(1);
            }
        };
        if let Ok(url) = settings.get_string("database_url") {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}
