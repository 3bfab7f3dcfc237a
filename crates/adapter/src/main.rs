//! `cipher-adapter`: stream one file through a cipher session.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise structured logging.
//! 3. Bootstrap the native engine (one-time self-test).
//! 4. Open a session, absorb AAD, stream the input, finalize.
//! 5. Print an [`OperationReport`] (or [`ErrorReport`]) as JSON on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use cipher_adapter::config::{Config, Job};
use cipher_adapter::{engine, telemetry, CipherSession, NativeEngine, ParameterSpec};
use common::{CipherError, ErrorReport, Mode, OperationReport};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(&cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        cipher = %cfg.cipher,
        direction = %cfg.direction,
        "cipher-adapter starting"
    );

    // -----------------------------------------------------------------------
    // 3. Engine bootstrap
    // -----------------------------------------------------------------------
    let engine = engine::bootstrap().context("native engine bootstrap failed")?;

    // -----------------------------------------------------------------------
    // 4. Run
    // -----------------------------------------------------------------------
    let job = cfg.job()?;
    match run(engine, &cfg, &job).await {
        Ok(report) => {
            info!(
                input_bytes = report.input_bytes,
                output_bytes = report.output_bytes,
                updates = report.updates,
                "operation complete"
            );
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        Err(e) => {
            if let Some(cipher_err) = e.downcast_ref::<CipherError>() {
                error!(error = cipher_err.kind(), "operation failed");
                println!("{}", serde_json::to_string(&ErrorReport::from(cipher_err))?);
            }
            Err(e)
        }
    }
}

/// Drive one session over the configured input, closing it on every path.
async fn run(engine: Arc<dyn NativeEngine>, cfg: &Config, job: &Job) -> Result<OperationReport> {
    let params = ParameterSpec::Iv(job.iv.clone());
    let mut session = CipherSession::start(engine, job.direction, &job.key, &params, job.spec)?;
    let result = stream(&mut session, cfg, job).await;
    session.close();
    result
}

async fn stream(session: &mut CipherSession, cfg: &Config, job: &Job) -> Result<OperationReport> {
    if let Some(aad) = &job.aad {
        session.update_aad(aad)?;
    }

    let mut input = File::open(&cfg.input_path)
        .await
        .with_context(|| format!("failed to open {}", cfg.input_path))?;
    let mut output = BufWriter::new(
        File::create(&cfg.output_path)
            .await
            .with_context(|| format!("failed to create {}", cfg.output_path))?,
    );

    let mut updates = 0u64;
    if job.spec.mode == Mode::Ccm {
        // The first data call fixes the CCM message length.
        let mut whole = Vec::new();
        input
            .read_to_end(&mut whole)
            .await
            .context("failed to read input")?;
        let out = session.finalize(&whole)?;
        output.write_all(&out).await.context("failed to write output")?;
    } else {
        let mut buf = BytesMut::with_capacity(cfg.chunk_size);
        loop {
            buf.reserve(cfg.chunk_size);
            let n = (&mut input)
                .take(cfg.chunk_size as u64)
                .read_buf(&mut buf)
                .await
                .context("failed to read input")?;
            if n == 0 {
                break;
            }
            let chunk: Bytes = buf.split().freeze();
            let out = session.update(&chunk)?;
            updates += 1;
            output.write_all(&out).await.context("failed to write output")?;
        }
        let out = session.finalize(&[])?;
        output.write_all(&out).await.context("failed to write output")?;
    }
    output.flush().await.context("failed to flush output")?;

    Ok(OperationReport {
        cipher: job.spec,
        direction: job.direction,
        input_bytes: session.accumulated_input() as u64,
        output_bytes: session.accumulated_output() as u64,
        updates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use common::Direction;

    fn scratch(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("cipher-adapter-{}-{name}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned()
    }

    fn config(cipher: &str, direction: Direction, input: &str, output: &str) -> Config {
        Config {
            cipher: cipher.into(),
            padding: "PKCS7".into(),
            direction,
            key_b64: STANDARD.encode([3u8; 32]),
            iv_b64: STANDARD.encode([5u8; 12]),
            aad_b64: Some(STANDARD.encode(b"file header")),
            input_path: input.into(),
            output_path: output.into(),
            chunk_size: 10,
            log_level: "info".into(),
        }
    }

    async fn round_trip(cipher: &str) {
        let engine = engine::bootstrap().unwrap();
        let plain_path = scratch("plain");
        let sealed_path = scratch("sealed");
        let opened_path = scratch("opened");
        let plaintext = b"streamed through the adapter in ten-byte chunks".to_vec();
        tokio::fs::write(&plain_path, &plaintext).await.unwrap();

        let enc = config(cipher, Direction::Encrypt, &plain_path, &sealed_path);
        let report = run(engine.clone(), &enc, &enc.job().unwrap()).await.unwrap();
        assert_eq!(report.input_bytes, plaintext.len() as u64);
        assert_eq!(report.output_bytes, plaintext.len() as u64 + 16);

        let dec = config(cipher, Direction::Decrypt, &sealed_path, &opened_path);
        run(engine.clone(), &dec, &dec.job().unwrap()).await.unwrap();
        assert_eq!(tokio::fs::read(&opened_path).await.unwrap(), plaintext);
        assert_eq!(engine.live_contexts(), 0);

        for path in [plain_path, sealed_path, opened_path] {
            let _ = tokio::fs::remove_file(path).await;
        }
    }

    #[tokio::test]
    async fn gcm_file_round_trip() {
        round_trip("AES-256-GCM").await;
    }

    #[tokio::test]
    async fn ccm_file_round_trip() {
        round_trip("AES-256-CCM").await;
    }

    #[tokio::test]
    async fn missing_input_still_closes_session() {
        let engine = engine::bootstrap().unwrap();
        let cfg = config("AES-256-GCM", Direction::Encrypt, &scratch("absent"), &scratch("out"));
        assert!(run(engine.clone(), &cfg, &cfg.job().unwrap()).await.is_err());
        assert_eq!(engine.live_contexts(), 0);
        assert_eq!(engine.contexts_destroyed(), engine.contexts_created());
    }
}
