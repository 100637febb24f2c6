use std::fs;

use anyhow::{Context, Result};
use renderer::DEFAULT_FRAGMENT_SHADER;
use shaderstore::{NewShader, ShaderStore};

use crate::cli::NewArgs;
use crate::paths::AppPaths;

fn open_store(paths: &AppPaths) -> Result<ShaderStore> {
    let root = paths.shader_store_dir();
    ShaderStore::open(&root)
        .with_context(|| format!("failed to open shader store at {}", root.display()))
}

pub fn list(paths: &AppPaths) -> Result<()> {
    let records = open_store(paths)?.list()?;
    if records.is_empty() {
        println!("No saved shaders.");
        return Ok(());
    }

    for record in records {
        let visibility = if record.is_public { "public" } else { "private" };
        println!(
            "{}  {}  {visibility:<7}  {}",
            record.id,
            record.updated_at.format("%Y-%m-%d %H:%M:%S"),
            record.title
        );
    }
    Ok(())
}

pub fn show(paths: &AppPaths, id: &str) -> Result<()> {
    let record = open_store(paths)?.get(id)?;
    println!("id:          {}", record.id);
    println!("title:       {}", record.title);
    if !record.description.is_empty() {
        println!("description: {}", record.description);
    }
    println!("public:      {}", record.is_public);
    println!("created:     {}", record.created_at.to_rfc3339());
    println!("updated:     {}", record.updated_at.to_rfc3339());
    println!();
    print!("{}", record.code);
    if !record.code.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub fn delete(paths: &AppPaths, id: &str) -> Result<()> {
    open_store(paths)?.delete(id)?;
    println!("Deleted {id}");
    Ok(())
}

pub fn create(paths: &AppPaths, args: NewArgs) -> Result<()> {
    let code = match &args.file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read shader at {}", path.display()))?,
        None => DEFAULT_FRAGMENT_SHADER.to_string(),
    };
    let record = open_store(paths)?.create(NewShader {
        title: args.title,
        description: args.description,
        code,
        is_public: args.public,
    })?;
    println!("{}", record.id);
    Ok(())
}
