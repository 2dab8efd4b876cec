use pooled_io::{BufferedStream, Config, MemoryStream, SeekOrigin, SharedStream, WorkerPool};
use tokio::runtime::Builder;
use std::{error::Error, time::Instant};
use tracing_subscriber::EnvFilter;


fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(async {
        let now = Instant::now();
        let pool = WorkerPool::with_config(Config::io_bound())?;

        let inner = SharedStream::new(MemoryStream::new());
        let stream = SharedStream::new(BufferedStream::with_capacity(inner.clone(), 64)?);

        let mut handles = Vec::new();
        for chunk in 0..16u8 {
            handles.push(stream.write_async(&pool, vec![chunk; 256])?);
        }
        for result in WorkerPool::join_handles(handles).await {
            result?;
        }

        stream.flush_async(&pool).await?;
        stream.seek_async(&pool, 0, SeekOrigin::Begin).await?;
        let head = stream.read_async(&pool, 16)?.await?;

        println!("written: {} bytes, head: {:?}", inner.with(|s| s.buffer().len()), head);
        println!("metrics: {:?}", pool.metrics());

        pool.shutdown();
        println!("elapsed: {:?}", now.elapsed());
        Ok::<(), Box<dyn Error>>(())
    })
}
