use gems_accel::*;
use std::time::Instant;

fn main() -> Result<()> {
    println!("=== Accelerated Operator Pipeline ===\n");

    let gems = Gems::from_env();
    run_pipeline(&gems)?;
    print_registry();

    #[cfg(feature = "cuda")]
    {
        println!("\nInitializing CUDA runtime...");
        match cube::init_cuda_runtime() {
            Ok(runtime) => run_device(&gems, &runtime)?,
            Err(e) => println!("CUDA not available: {e}"),
        }
    }

    #[cfg(all(feature = "wgpu", not(feature = "cuda")))]
    {
        println!("\nInitializing WGPU runtime...");
        match cube::init_wgpu_runtime() {
            Ok(runtime) => run_device(&gems, &runtime)?,
            Err(e) => println!("WGPU not available: {e}"),
        }
    }

    #[cfg(not(any(feature = "cuda", feature = "wgpu")))]
    {
        println!("\nNo device features enabled, host lanes only.");
        println!("Build with: cargo run -p gems_hello --features cuda");
        println!("        or: cargo run -p gems_hello --features wgpu");
    }

    Ok(())
}

fn run_pipeline(gems: &Gems) -> Result<()> {
    // --- Step 1: a 1x3x4x4 image with a per-channel ramp ---
    let shape = [1, 3, 4, 4];
    let data: Vec<f32> = (0..48).map(|i| (i % 16) as f32 + 100.0 * (i / 16) as f32).collect();
    let image = gems.tensor(shape, data)?;
    println!("Step 1: Uploaded {:?} image ({} elements)", image.shape(), image.numel());

    // --- Step 2: nearest upsample, first call tunes ---
    let start = Instant::now();
    let up = upsample_nearest2d(gems, &image, &[8, 8], None, None)?;
    let first = start.elapsed();
    let start = Instant::now();
    let again = upsample_nearest2d(gems, &image, &[8, 8], None, None)?;
    let second = start.elapsed();
    assert_eq!(up.to_vec(), again.to_vec());
    println!(
        "Step 2: upsample_nearest2d {:?} -> {:?} (tuned in {first:?}, cached call {second:?})",
        image.shape(),
        up.shape()
    );
    if let Some(cfg) = gems.tune_cache().resize.cached(&("nearest", [1, 3, 8, 8], [false, false])) {
        println!("  chosen launch: {cfg}");
    }
    let row: Vec<f32> = (0..8).filter_map(|x| up.get(&[0, 0, 0, x])).collect();
    println!("  channel 0, row 0: {row:?}");

    // --- Step 3: downsample back and compare ---
    let down = upsample_nearest2d(gems, &up, &[4, 4], None, None)?;
    println!("Step 3: round trip matches input: {}", down.to_vec() == image.to_vec());

    // --- Step 4: normalise and activate ---
    let flat = image.reshape([3, 16])?;
    let (normed, mean, rstd) = layer_norm(gems, &flat, &[16], None, None, 1e-5)?;
    let act = gelu(gems, &normed, GeluApproximate::None)?;
    println!("Step 4: layer_norm means {:?}, rstd {:?}", mean.to_vec(), rstd.to_vec());
    println!("  gelu(row 0)[..4] = {:?}", &act.to_vec()[..4]);

    // --- Step 5: reductions ---
    let total = sum(gems, &image)?.to_vec()[0];
    let lo = amin(gems, &image)?.to_vec()[0];
    let hi = amax(gems, &image)?.to_vec()[0];
    println!("Step 5: sum = {total}, min = {lo}, max = {hi}");

    println!(
        "\nLedger: {} allocations, {} live bytes; {} keys benchmarked",
        gems.ledger().allocations(),
        gems.ledger().live_bytes(),
        gems.tune_cache().benchmarks()
    );
    Ok(())
}

fn print_registry() {
    let mut table = DispatchTable::new();
    let scope = match GemsScope::new(&mut table) {
        Ok(scope) => scope,
        Err(e) => {
            println!("registration failed: {e}");
            return;
        }
    };
    let autograd = Op::ALL
        .iter()
        .filter(|op| op.dispatch_key() == DispatchKey::AutogradCuda)
        .count();
    println!(
        "\nRegistered {} operators ({} under {})",
        scope.library().len(),
        autograd,
        DispatchKey::AutogradCuda
    );
}

#[cfg(any(feature = "cuda", feature = "wgpu"))]
fn run_device<R: cube::CubeclRuntime>(gems: &Gems, runtime: &cube::RuntimeContext<R>) -> Result<()> {
    use cube::*;

    println!("  Backend:       {}", runtime.backend_name());
    let (max_page, align) = runtime.memory_properties();
    println!("  Max page size: {} bytes ({:.0} MB)", max_page, max_page as f64 / 1_048_576.0);
    println!("  Alignment:     {} bytes", align);

    let host = gems.tensor([1, 1, 4, 4], (0..16).map(|v| v as f32).collect())?;
    let input = tensor_to_device(&host, runtime)?;
    let tuner = resize_tuner(gems.config());
    let output = upsample_nearest2d_execute::<_, f32>(&input, &[2, 2], None, None, &tuner, runtime)?;
    runtime.sync();
    let result: Tensor<f32> = tensor_from_device(&output, runtime)?;
    let expected = upsample_nearest2d(gems, &host, &[2, 2], None, None)?;
    println!(
        "Device: upsample_nearest2d -> {:?}, matches host: {}",
        result.to_vec(),
        result.to_vec() == expected.to_vec()
    );

    let total: f32 = sum_execute(&input, runtime)?;
    println!("Device: sum = {total}");
    Ok(())
}
