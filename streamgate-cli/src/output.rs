//! Output rendering for resolved links.

use anyhow::Result;
use serde::Serialize;
use stream_resolvers::ResolvedLink;

use crate::cli::OutputFormat;

#[derive(Serialize)]
struct LinkReport<'a> {
    url: &'a str,
    proxied_url: Option<&'a str>,
    quality: &'a str,
    kind: &'a str,
    referer: Option<&'a str>,
}

/// A resolved link paired with its proxied URL, when the proxy is running.
pub struct ResolvedOutput {
    pub link: ResolvedLink,
    pub proxied_url: Option<String>,
}

pub fn print_links(outputs: &[ResolvedOutput], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Pretty => {
            for (index, output) in outputs.iter().enumerate() {
                let link = &output.link;
                println!("[{}] {} ({:?})", index + 1, link.quality, link.kind);
                println!("    url: {}", link.url);
                if let Some(proxied) = &output.proxied_url {
                    println!("    proxied: {proxied}");
                }
                if let Some(referer) = &link.referer {
                    println!("    referer: {referer}");
                }
            }
        }
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let reports: Vec<LinkReport> = outputs
                .iter()
                .map(|output| LinkReport {
                    url: &output.link.url,
                    proxied_url: output.proxied_url.as_deref(),
                    quality: output.link.quality.as_str(),
                    kind: match output.link.kind {
                        stream_resolvers::LinkKind::Direct => "direct",
                        stream_resolvers::LinkKind::Hls => "hls",
                    },
                    referer: output.link.referer.as_deref(),
                })
                .collect();
            let rendered = if format == OutputFormat::Json {
                serde_json::to_string_pretty(&reports)?
            } else {
                serde_json::to_string(&reports)?
            };
            println!("{rendered}");
        }
    }
    Ok(())
}
