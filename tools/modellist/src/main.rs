use std::env;

use q2model::prelude::*;

fn main() {
	env_logger::init();

	let mut args = env::args().skip(1);
	let (Some(game_dir), Some(map)) = (args.next(), args.next()) else {
		eprintln!("Usage: modellist <game dir> <map> [model paths...]");
		std::process::exit(1);
	};

	let mut registry = ModelRegistry::new(DirFileService::new(game_dir), ImageCache::new(), NullSurfaceBuilder);

	if let Err(err) = registry.begin_world_registration(&map, false) {
		eprintln!("Loading maps/{map}.bsp: {err}");
		std::process::exit(1);
	}
	for name in args {
		match registry.register_model(&name) {
			Ok(Some(_)) => {}
			Ok(None) => log::warn!("{name} not found"),
			Err(err) => log::error!("{err}"),
		}
	}
	registry.end_world_registration();

	println!("{}", registry.model_list());
}
