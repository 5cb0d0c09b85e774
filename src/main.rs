use std::cmp::Ordering;
use std::sync::Arc;

use log::info;

use strata::buffer::BufferPoolManager;
use strata::storage::disk::DiskManager;
use strata::storage::page::{SlottedPage, SlottedPageRef};
use strata::tuple::{DataType, Schema, Tuple, Value};
use strata::{StorageConfig, StrataError};

fn main() -> Result<(), StrataError> {
    // Optional config file as the first argument; STRATA_* variables override it.
    let config_file = std::env::args().nth(1).unwrap_or_default();
    let config = StorageConfig::load(&config_file)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    println!("Strata - a disk-oriented page storage engine in Rust");
    println!("====================================================\n");

    let dir = std::env::temp_dir().join(format!("strata-demo-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let db_path = dir.join("demo.db");

    let disk_manager = Arc::new(DiskManager::with_flush_interval(
        &db_path,
        config.log_flush_interval(),
    )?);
    let bpm = BufferPoolManager::from_config(&config, disk_manager)?;
    info!(
        "buffer pool of {} frames, LRU-{}",
        bpm.pool_size(),
        config.replacer_k
    );

    let schema = Schema::builder()
        .column("id", DataType::Int32)
        .column("name", DataType::VarChar(32))
        .column("score", DataType::Float32)
        .column("active", DataType::Boolean)
        .build();
    println!("Schema: {}", schema);

    let page_id = {
        let Some(mut guard) = bpm.new_page_write()? else {
            println!("buffer pool exhausted");
            return Ok(());
        };
        let page_id = guard.page_id();
        let mut page = SlottedPage::new(guard.data_mut());
        page.init();

        let rows = [
            (1, "ada", 91.5, true),
            (2, "grace", 88.0, false),
            (3, "barbara", 79.25, true),
        ];
        for (id, name, score, active) in rows {
            let tuple = Tuple::new(vec![
                Value::Int32(id),
                Value::from(name),
                Value::Float32(score),
                Value::Boolean(active),
            ]);
            let slot = page.append_tuple(&tuple)?;
            println!("Inserted {} at slot {}", tuple, slot.as_u16());
        }
        page.delete_tuple(strata::SlotId::new(1));

        let header = page.header();
        println!(
            "\nPage {}: {} tuples, {} deleted, {} bytes free",
            page_id, header.num_tuples, header.num_deleted, header.free_space
        );
        page_id
    };

    bpm.flush_page(page_id)?;
    bpm.disk_manager().write_log(format!("flushed {}\n", page_id).as_bytes())?;
    bpm.disk_manager().flush_log()?;
    println!("Flushed {} to {}", page_id, db_path.display());

    let mut rows = Vec::new();
    if let Some(guard) = bpm.fetch_page_read(page_id)? {
        let page = SlottedPageRef::new(guard.data());
        println!("\nReading back {}:", page_id);
        for slot in page.live_slots() {
            if let Some(tuple) = page.read_tuple(&schema, slot)? {
                println!("  - slot {}: {}", slot.as_u16(), tuple);
                rows.push(tuple);
            }
        }
    }

    if let Some(summary) = schema.project_by_name(&["name", "score"]) {
        let best = rows.iter().max_by(|a, b| {
            a.value_by_name(&schema, "score")
                .zip(b.value_by_name(&schema, "score"))
                .and_then(|(x, y)| x.compare(y))
                .unwrap_or(Ordering::Equal)
        });
        if let Some(best) = best {
            let values: Vec<String> = summary
                .columns()
                .filter_map(|c| best.value_by_name(&schema, c.name()))
                .map(|v| v.to_string())
                .collect();
            println!("\nTop score {}: {}", summary, values.join(", "));
        }
    }

    drop(bpm);
    std::fs::remove_dir_all(&dir)?;
    println!("\nDemo completed successfully!");
    Ok(())
}
