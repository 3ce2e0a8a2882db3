use criterion::{black_box, criterion_group, criterion_main, Criterion};
use unused_value_analyzer::ir::{
    CodeUnitKind, Compilation, IrBuilder, MethodRef, ParameterModifier, TypeRef,
};
use unused_value_analyzer::{CancellationToken, UnusedValueAnalyzer};

/// `methods` copies of a loop with a dead store and a branch
fn synthetic_compilation(methods: usize) -> Compilation {
    let mut b = IrBuilder::new();
    for index in 0..methods {
        let mut f = b.method(&format!("m{}", index), TypeRef::int());
        let c = b.parameter(&mut f, "c", TypeRef::boolean(), ParameterModifier::None);
        let x = b.local(&f, "x", TypeRef::int());

        let zero = b.int(0);
        let declare = b.declare(x, Some(zero));
        let cond = b.param_ref(c);
        let read = b.local_ref(x);
        let arg = b.arg(read);
        let call = b.call(MethodRef::new_static("C", "Use"), None, vec![arg], TypeRef::void());
        let call = b.expr_stmt(call);
        let target = b.local_ref(x);
        let one = b.int(1);
        let assign = b.assign(target, one);
        let assign = b.expr_stmt(assign);
        let body = b.block(vec![call, assign]);
        let looping = b.while_(cond, body);

        let cond = b.param_ref(c);
        let target = b.local_ref(x);
        let two = b.int(2);
        let overwrite = b.assign(target, two);
        let overwrite = b.expr_stmt(overwrite);
        let branch = b.if_(cond, overwrite, None);

        let read = b.local_ref(x);
        let ret = b.ret(Some(read));
        b.body(&mut f, CodeUnitKind::MethodBody, vec![declare, looping, branch, ret]);
        b.add(f);
    }
    b.finish()
}

fn analysis_benchmark(c: &mut Criterion) {
    let compilation = synthetic_compilation(200);
    let analyzer = UnusedValueAnalyzer::default();
    let token = CancellationToken::none();

    c.bench_function("analyze_compilation_200_methods", |b| {
        b.iter(|| {
            black_box(
                analyzer
                    .analyze_compilation(black_box(&compilation), &token)
                    .unwrap(),
            );
        });
    });
}

criterion_group!(benches, analysis_benchmark);
criterion_main!(benches);
