use anyhow::Result;
use feed_importer::infra::InMemoryUrlIndex;
use feed_importer::pipeline::processing::UniqueSlugAllocator;

fn catalog() -> InMemoryUrlIndex {
    InMemoryUrlIndex::new()
        .with_rewrite("shoe.html", 1, "OTHER-1")
        .with_rewrite("SKU1-shoe.html", 2, "OTHER-2")
        .with_rewrite("boot.html", 3, "SKU2")
}

#[test]
fn test_taken_slugs_fall_through_to_numbered_candidate() -> Result<()> {
    let index = catalog();
    let mut allocator = UniqueSlugAllocator::new(&index, ".html")?;

    assert_eq!(allocator.resolve("shoe", "SKU1")?, Some("SKU1-shoe-1".to_string()));
    assert_eq!(allocator.resolve("Boot", "SKU2")?, Some("boot".to_string()));
    Ok(())
}

#[test]
fn test_rerun_against_same_catalog_is_stable() -> Result<()> {
    let index = catalog();
    let inputs = [("shoe", "SKU1"), ("shoe", "SKU3"), ("Winter Boot!", "SKU4"), ("shoe", "SKU1")];

    let run = || -> Result<Vec<Option<String>>> {
        let mut allocator = UniqueSlugAllocator::new(&index, ".html")?;
        inputs
            .iter()
            .map(|(key, id)| Ok(allocator.resolve(key, id)?))
            .collect()
    };

    let first = run()?;
    assert_eq!(first, run()?);
    assert_eq!(first[2], Some("winter-boot".to_string()));
    assert_eq!(first[3], Some("SKU1-shoe-2".to_string()));
    Ok(())
}
