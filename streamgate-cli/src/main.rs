mod cli;
mod config;
mod output;

use std::process;

use anyhow::Result;
use clap::Parser;
use hls_proxy::{ProxyManager, ProxyServer, ProxyServerConfig};
use stream_resolvers::StreamResolver;
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::{Args, Commands, OutputFormat};
use crate::config::AppConfig;
use crate::output::ResolvedOutput;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;
    let config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Resolve {
            url,
            referer,
            cookies,
            best,
            proxy,
            output,
        } => resolve(&config, &url, referer, cookies, best, proxy, output).await,

        Commands::Serve { bind, port } => serve(&config, bind, port).await,

        Commands::Config { show, reset } => {
            if reset {
                AppConfig::reset(args.config.as_deref())?;
                println!("Configuration reset to defaults");
            } else if show {
                println!("{}", config.show()?);
            } else {
                println!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn resolve(
    config: &AppConfig,
    url: &str,
    referer: Option<String>,
    cookies: Option<String>,
    best: bool,
    proxy: bool,
    format: OutputFormat,
) -> Result<()> {
    let client = stream_resolvers::default_client();
    let resolver = StreamResolver::with_client(client.clone());

    // Per-source config fills in whatever the flags left unset.
    let source_key = stream_resolvers::sources::create_extractor(url, None, None, client)
        .map(|extractor| extractor.name().to_ascii_lowercase())
        .ok();
    let referer = referer.or_else(|| {
        source_key
            .as_ref()
            .and_then(|key| config.resolver.referers.get(key).cloned())
    });
    let cookies = cookies.or_else(|| {
        source_key
            .as_ref()
            .and_then(|key| config.resolver.cookies.get(key).cloned())
    });

    let links = if best {
        vec![
            resolver
                .resolve_best_with_cookies(url, referer.as_deref(), cookies.as_deref())
                .await?,
        ]
    } else {
        resolver
            .resolve_with_cookies(url, referer.as_deref(), cookies.as_deref())
            .await?
    };

    if !proxy {
        let outputs: Vec<ResolvedOutput> = links
            .into_iter()
            .map(|link| ResolvedOutput {
                link,
                proxied_url: None,
            })
            .collect();
        return output::print_links(&outputs, format);
    }

    let manager = ProxyManager::new(proxy_server_config(config, None, None));
    let base_url = manager.start().await?;
    info!("proxy running at {base_url}");

    let mut outputs = Vec::with_capacity(links.len());
    for link in links {
        let proxied_url = manager.proxy_url(&link.url, &link.headers).await?;
        outputs.push(ResolvedOutput {
            link,
            proxied_url: Some(proxied_url),
        });
    }
    output::print_links(&outputs, format)?;

    info!("serving proxied links; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    manager.stop().await;
    Ok(())
}

async fn serve(config: &AppConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    let server = ProxyServer::new(proxy_server_config(config, bind, port));

    let token = server.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    server.run().await?;
    Ok(())
}

fn proxy_server_config(
    config: &AppConfig,
    bind: Option<String>,
    port: Option<u16>,
) -> ProxyServerConfig {
    ProxyServerConfig {
        bind_address: bind.unwrap_or_else(|| config.proxy.bind_address.clone()),
        port: port.unwrap_or(config.proxy.port),
        ..ProxyServerConfig::default()
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
    Ok(())
}
