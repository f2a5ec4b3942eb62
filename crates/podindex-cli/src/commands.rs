//! Command handlers: thin pass-throughs to podindex-core.

use crate::Command;
use anyhow::Result;
use podindex_core::archive::extract_member;
use podindex_core::network::{DownloadManager, DownloadProgress};
use podindex_core::{DownloadOptions, ExtractOptions, IndexConfig, IndexSession, TableDescriptor};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

pub(crate) async fn run(command: Command) -> Result<()> {
    match command {
        Command::Download {
            url,
            path,
            chunk_size,
            no_progress,
        } => {
            let mut options = DownloadOptions::for_url(url)?.with_chunk_size(chunk_size);
            if let Some(path) = path {
                options = options.with_destination(path);
            }
            download(&options, !no_progress).await
        }
        Command::Unpack {
            path,
            db_name,
            out_path,
        } => {
            let mut options = ExtractOptions::for_archive(path)?.with_out_dir(out_path);
            if let Some(db_name) = db_name {
                options = options.with_member(db_name);
            }
            let extracted = extract_member(&options)?;
            info!("Extracted {}", extracted.display());
            Ok(())
        }
        Command::SetupIndex {
            db,
            table,
            fields,
            no_progress,
        } => setup_index(&db, &table, &fields, !no_progress),
        Command::Search {
            term,
            out_fields,
            db,
            table,
            fields,
        } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            search(&db, &table, &fields, &term, &out_fields, &mut out)
        }
    }
}

async fn download(options: &DownloadOptions, show_progress: bool) -> Result<()> {
    let manager = DownloadManager::new()?;
    info!("Downloading {} to {}", options.url, options.destination.display());

    if !show_progress {
        manager.download(options, None).await?;
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel::<DownloadProgress>(16);
    let reporter = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            match progress.percent {
                Some(percent) => info!(
                    "{:.1}% ({} / {} bytes)",
                    percent,
                    progress.bytes_downloaded,
                    progress.total_bytes.unwrap_or(0)
                ),
                None => info!("{} bytes", progress.bytes_downloaded),
            }
        }
    });

    let result = manager.download(options, Some(tx)).await;
    // The sender is gone once download returns, so the reporter drains and ends
    let _ = reporter.await;
    result?;
    Ok(())
}

fn setup_index(db: &Path, table: &str, fields: &[String], show_progress: bool) -> Result<()> {
    let mut session = IndexSession::open(
        PathBuf::from(db),
        TableDescriptor::new(table, fields.iter().cloned()),
        IndexConfig::default(),
    )?;

    info!("total {} records in {} table", session.count()?, table);
    info!("creating FTS table for {}", fields.join(", "));
    session.build_index()?;
    info!("populating {}", session.index_name());
    let report = session.populate_index(show_progress)?;
    info!(
        "indexed {} records ({} engine steps, {} in the copy statement, {} estimated)",
        report.inserted,
        report.engine_steps,
        report.statement_steps,
        report.estimate.total_expected_steps
    );
    session.close()?;
    Ok(())
}

fn search(
    db: &Path,
    table: &str,
    fields: &[String],
    term: &str,
    out_fields: &[String],
    out: &mut impl Write,
) -> Result<()> {
    let session = IndexSession::open(
        PathBuf::from(db),
        TableDescriptor::new(table, fields.iter().cloned()),
        IndexConfig::default(),
    )?;

    let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
    let out_fields: Vec<&str> = out_fields.iter().map(String::as_str).collect();

    let mut cursor = session.search(term, &out_fields, Some(&fields))?;
    for row in cursor.rows()? {
        writeln!(out, "{}", row?.to_json())?;
    }
    Ok(())
}
