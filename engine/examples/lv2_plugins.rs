#[cfg(all(unix, not(target_os = "macos")))]
fn main() {
    use lv2file_engine::PluginFactory;
    use lv2file_engine::plugins::lv2::Lv2World;

    let world = Lv2World::load();
    let plugins = world.plugins();
    println!("Found {} LV2 plugins", plugins.len());
    for info in &plugins {
        println!("{:>4}  {} [{}]", info.index, info.name, info.uri);
    }

    let Some(name) = std::env::args().nth(1) else {
        println!();
        println!("Pass a plugin URI or index to inspect ports and instantiate it:");
        println!("cargo run --manifest-path engine/Cargo.toml --example lv2_plugins -- <plugin>");
        return;
    };

    let plugin = match world.plugin(&name) {
        Ok(plugin) => plugin,
        Err(error) => {
            eprintln!("Lookup failed: {error}");
            std::process::exit(1);
        }
    };
    let layout = plugin.ports();
    println!();
    println!(
        "{}: audio in/out {}/{}, controls in/out {}/{}, worker: {}",
        plugin.name(),
        layout.audio_input_count(),
        layout.audio_output_count(),
        layout.control_input_count(),
        layout.control_output_count(),
        plugin.has_worker()
    );
    for port in layout.ports() {
        println!("  {:>3} {:<24} {:?}", port.index, port.symbol, port.kind);
    }
    match plugin.instantiate(48_000.0, 512) {
        Ok(_) => println!("Instantiated"),
        Err(error) => {
            eprintln!("{error}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn main() {
    eprintln!("LV2 hosting is not available on this platform");
}
