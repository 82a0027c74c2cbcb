use bulk_transfer_service::queue::JobQueue;
use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

fn bench_enqueue_dequeue(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("enqueue_then_dequeue", |b| {
        b.to_async(&rt).iter(|| async {
            let q: std::sync::Arc<JobQueue<i32>> = JobQueue::new();
            q.enqueue(1).await;
            q.try_dequeue().await
        })
    });
}

criterion_group!(benches, bench_enqueue_dequeue);
criterion_main!(benches);
