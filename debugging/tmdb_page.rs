//! Fetch one TMDB listing page or a movie detail and print it as JSON.
//! Usage:
//!   cargo run --bin tmdb_page -- popular [page]
//!   cargo run --bin tmdb_page -- search <keyword> [page]
//!   cargo run --bin tmdb_page -- detail <movie_id>
//! Requires TMDB_TOKEN in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use movielist::tmdb::{MovieSource, TmdbClient};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Query {
    Popular,
    Search,
    Detail,
}

impl FromStr for Query {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "popular" => Ok(Query::Popular),
            "search" => Ok(Query::Search),
            "detail" => Ok(Query::Detail),
            _ => Err(anyhow::anyhow!(
                "query must be 'popular', 'search' or 'detail'"
            )),
        }
    }
}

fn page_arg(arg: Option<&String>) -> Result<u32> {
    let Some(raw) = arg else { return Ok(1) };
    match raw.parse::<u32>().context("page must be a positive number")? {
        0 => Err(anyhow::anyhow!("page must be a positive number (pages start at 1)")),
        page => Ok(page),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().skip(1).collect();
    let query: Query = args
        .first()
        .context("missing query kind (popular | search | detail)")?
        .parse()?;
    let client = TmdbClient::from_env()?;

    let value = match query {
        Query::Popular => {
            let page = page_arg(args.get(1))?;
            serde_json::to_value(client.fetch_popular_page(page).await?)?
        }
        Query::Search => {
            let keyword = args.get(1).context("missing search keyword")?;
            let page = page_arg(args.get(2))?;
            serde_json::to_value(client.fetch_search_page(page, keyword).await?)?
        }
        Query::Detail => {
            let id: i32 = args
                .get(1)
                .context("missing movie id")?
                .parse()
                .context("movie id must be a number")?;
            serde_json::to_value(client.fetch_movie_detail(id).await?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
