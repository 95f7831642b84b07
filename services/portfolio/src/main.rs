use portfolio::{
    config::{
        TransportRuntime, alias_for_profile, http_workers_from_env, profile_config_from_env,
        routing_config_from_env, transport_runtime_from_env,
    },
    seed_sample_photos,
    store::RoutedCatalog,
    transport::{PortfolioRuntime, serve_http_with_workers},
};
use profile::select_startup;
use routing::StoreRouter;

fn main() {
    let serve_mode = std::env::args().any(|arg| arg == "--serve");
    let seed_mode = std::env::args().any(|arg| arg == "--seed");

    let profile_config = profile_config_from_env();
    let routing_config = routing_config_from_env();

    if serve_mode {
        let selection = select_startup(&profile_config);
        // Non-request work in this process routes like the requests will: the
        // detected profile fixes the process-wide alias override.
        let startup_alias = alias_for_profile(selection.profile);
        let routing_config = routing_config.with_mode_override(startup_alias);
        let http_workers = http_workers_from_env();
        let transport_runtime = transport_runtime_from_env();

        println!(
            "portfolio auto profile={}, db_mode={}, addrport={}",
            selection.profile.as_str(),
            startup_alias.as_str(),
            selection.bind_addr
        );
        println!(
            "portfolio transport listening on http://{}",
            selection.bind_addr
        );
        println!("portfolio transport workers: {http_workers}");
        println!(
            "portfolio transport runtime: {}",
            transport_runtime.as_str()
        );
        println!(
            "portfolio health endpoint: http://{}/health",
            selection.bind_addr
        );
        println!(
            "portfolio metrics endpoint: http://{}/metrics",
            selection.bind_addr
        );
        println!(
            "portfolio routing debug endpoint: http://{}/debug/routing",
            selection.bind_addr
        );
        println!(
            "portfolio API endpoint: http://{}/v1/photos",
            selection.bind_addr
        );

        let runtime = PortfolioRuntime::new(StoreRouter::new(routing_config));
        match transport_runtime {
            TransportRuntime::Std => {
                if let Err(err) =
                    serve_http_with_workers(runtime, &selection.bind_addr, http_workers)
                {
                    eprintln!("portfolio transport failed: {err}");
                    std::process::exit(1);
                }
            }
            TransportRuntime::Axum => {
                #[cfg(feature = "async-transport")]
                {
                    if let Err(err) = portfolio::transport_axum::serve_http_with_axum(
                        runtime,
                        &selection.bind_addr,
                        http_workers,
                    ) {
                        eprintln!("portfolio transport failed: {err}");
                        std::process::exit(1);
                    }
                }
                #[cfg(not(feature = "async-transport"))]
                {
                    eprintln!(
                        "portfolio transport runtime 'axum' requires build feature 'async-transport'"
                    );
                    std::process::exit(2);
                }
            }
        }
    } else if seed_mode {
        let mut catalog = RoutedCatalog::new(StoreRouter::new(routing_config));
        match seed_sample_photos(&mut catalog) {
            Ok((alias, count)) => println!(
                "portfolio seeded {count} photos into the '{}' store",
                alias.as_str()
            ),
            Err(err) => {
                eprintln!("portfolio seed failed: {err:?}");
                std::process::exit(1);
            }
        }
    } else {
        let selection = select_startup(&profile_config);
        println!(
            "portfolio detected profile={}, addrport={}",
            selection.profile.as_str(),
            selection.bind_addr
        );
        println!(
            "portfolio routing: default_alias={}, mode_override={}, current_alias={}",
            routing_config.default_alias.as_str(),
            routing_config
                .mode_override
                .map(|alias| alias.as_str())
                .unwrap_or("unset"),
            routing_config.resolve_current_alias().as_str()
        );
        println!(
            "portfolio run with --serve to start the listener or --seed to seed the resolved store"
        );
    }
}
