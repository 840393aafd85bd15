use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sigkit::onset::DetectorRequest;
use sigkit::spectral::{FrameRequest, Pvoc};
use sigkit::vector::{Fvec, VecRequest};
use sigkit::{destroy, Factory};

fn bench_vector(c: &mut Criterion) {
    let factory = Factory::default();
    c.bench_function("fvec_1024", |b| {
        b.iter(|| {
            let v = factory
                .construct::<Fvec>(black_box(&VecRequest::new(1024)))
                .unwrap();
            destroy(Some(black_box(v)));
        })
    });
    c.bench_function("fvec_rejected", |b| {
        b.iter(|| {
            let err = factory.construct::<Fvec>(black_box(&VecRequest::new(0)));
            black_box(err).unwrap_err();
        })
    });
}

fn bench_composites(c: &mut Criterion) {
    let factory = Factory::default();
    let frame = FrameRequest {
        buf_size: 1024,
        hop_size: 256,
    };
    c.bench_function("pvoc_1024_256", |b| {
        b.iter(|| destroy(Some(factory.construct::<Pvoc>(black_box(&frame)).unwrap())))
    });

    let req = DetectorRequest::new("default", 1024, 256, 44_100);
    c.bench_function("onset_default", |b| {
        b.iter(|| {
            destroy(Some(
                factory
                    .construct::<sigkit::onset::Onset>(black_box(&req))
                    .unwrap(),
            ))
        })
    });
    c.bench_function("tempo_default", |b| {
        b.iter(|| {
            destroy(Some(
                factory
                    .construct::<sigkit::tempo::Tempo>(black_box(&req))
                    .unwrap(),
            ))
        })
    });
}

criterion_group!(benches, bench_vector, bench_composites);
criterion_main!(benches);
