use anyhow::Result;
use async_trait::async_trait;
use gridfed::{
    AttrValue, CdlReader, FederationError, MetadataProvider, OpenOptions, PerFileMetadata,
    RangeSelector, SourceSet, groupby_time, open_mfdataset,
};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

/// CDL text for one source holding `values` along `time`
fn cdl_text(values: &[f64], units: &str, calendar: &str, vars: &[&str], lat: usize, title: &str) -> String {
    let mut text = String::from("netcdf fixture {\ndimensions:\n");
    text += &format!("\ttime = UNLIMITED ; // ({} currently)\n", values.len());
    text += &format!("\tlat = {lat} ;\n");
    text += "variables:\n\tdouble time(time) ;\n";
    text += &format!("\t\ttime:units = \"{units}\" ;\n");
    text += &format!("\t\ttime:calendar = \"{calendar}\" ;\n");
    text += "\tfloat lat(lat) ;\n\t\tlat:units = \"degrees_north\" ;\n";
    for var in vars {
        text += &format!("\tfloat {var}(time, lat) ;\n\t\t{var}:units = \"K\" ;\n");
    }
    text += &format!("\n// global attributes:\n\t\t:title = \"{title}\" ;\ndata:\n\n");
    let lats: Vec<String> = (0..lat).map(|i| format!("{}", i * 10)).collect();
    text += &format!(" lat = {} ;\n\n", lats.join(", "));
    let times: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    text += &format!(" time = {} ;\n}}\n", times.join(", "));
    text
}

fn daily(start: usize, steps: usize) -> Vec<f64> {
    (start..start + steps).map(|d| d as f64).collect()
}

async fn write_source(dir: &Path, name: &str, text: &str) -> Result<String> {
    let path = dir.join(name);
    tokio::fs::write(&path, text).await?;
    Ok(path.to_string_lossy().to_string())
}

async fn three_daily_sources(dir: &Path) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for (i, name) in ["tas_0.cdl", "tas_1.cdl", "tas_2.cdl"].iter().enumerate() {
        let text = cdl_text(
            &daily(i * 10, 10),
            "days since 2000-01-01",
            "standard",
            &["tas"],
            3,
            name,
        );
        paths.push(write_source(dir, name, &text).await?);
    }
    Ok(paths)
}

#[tokio::test]
async fn test_round_trip_daily_sources() -> Result<()> {
    let dir = tempdir()?;
    let paths = three_daily_sources(dir.path()).await?;

    let ds = open_mfdataset(&CdlReader::new(), &SourceSet::paths(paths.clone()), &OpenOptions::default()).await?;

    assert_eq!(ds.dims["time"], 30);
    assert_eq!(ds.dims["lat"], 3);
    assert_eq!(ds.variables["tas"].shape, vec![30, 3]);
    assert_eq!(ds.coords["time"].attrs["frequency"], AttrValue::from("1D"));
    assert_eq!(ds.registry.query(None), paths);
    assert!(ds.validate().is_empty());

    let groups = groupby_time(&ds, "1M".parse()?, "time", true)?;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].description.dims["time"], 30);
    assert_eq!(groups[0].description.registry.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_registry_ranges_and_metadata() -> Result<()> {
    let dir = tempdir()?;
    let paths = three_daily_sources(dir.path()).await?;
    let ds = open_mfdataset(&CdlReader::new(), &SourceSet::paths(paths.clone()), &OpenOptions::default()).await?;

    let overlapping = ds.registry.query(Some(&RangeSelector::between(5.0, 15.0)));
    assert_eq!(overlapping, paths[..2].to_vec());

    let entry = ds.registry.info(&paths[1])?;
    assert_eq!(entry.concat_dim, "time");
    match &entry.metadata["dims"] {
        AttrValue::Map(dims) => assert_eq!(dims["time"], AttrValue::Int(10)),
        other => panic!("unexpected dims metadata: {other:?}"),
    }
    assert_eq!(
        entry.metadata["variables"],
        AttrValue::List(vec![AttrValue::from("tas")])
    );

    let batch = ds.registry.to_record_batch()?;
    assert_eq!(batch.num_rows(), 3);
    assert!(matches!(
        ds.registry.info("elsewhere.cdl"),
        Err(FederationError::UnknownSource { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_caller_order_and_first_wins() -> Result<()> {
    let dir = tempdir()?;
    let paths = three_daily_sources(dir.path()).await?;
    let reversed: Vec<String> = paths.iter().rev().cloned().collect();

    let forward = open_mfdataset(&CdlReader::new(), &SourceSet::paths(paths.clone()), &OpenOptions::default()).await?;
    let backward = open_mfdataset(&CdlReader::new(), &SourceSet::paths(reversed.clone()), &OpenOptions::default()).await?;

    assert_eq!(forward.dims, backward.dims);
    assert_eq!(forward.attrs["title"], AttrValue::from("tas_0.cdl"));
    assert_eq!(backward.attrs["title"], AttrValue::from("tas_2.cdl"));
    assert_eq!(backward.registry.query(None), reversed);
    Ok(())
}

#[tokio::test]
async fn test_pattern_expansion_is_sorted_and_files_only() -> Result<()> {
    let dir = tempdir()?;
    for (name, start) in [("c.cdl", 20), ("a.cdl", 0), ("b.cdl", 10)] {
        let text = cdl_text(&daily(start, 10), "days since 2000-01-01", "standard", &["tas"], 2, name);
        write_source(dir.path(), name, &text).await?;
    }
    tokio::fs::create_dir(dir.path().join("d.cdl")).await?;
    write_source(dir.path(), "notes.txt", "not a source").await?;

    let pattern = format!("{}/*.cdl", dir.path().display());
    let ds = open_mfdataset(&CdlReader::new(), &SourceSet::pattern(pattern), &OpenOptions::default()).await?;

    let names: Vec<String> = ds
        .registry
        .query(None)
        .iter()
        .filter_map(|p| Path::new(p).file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    assert_eq!(names, vec!["a.cdl", "b.cdl", "c.cdl"]);
    assert_eq!(ds.attrs["title"], AttrValue::from("a.cdl"));
    Ok(())
}

#[tokio::test]
async fn test_no_sources() -> Result<()> {
    let dir = tempdir()?;
    let pattern = format!("{}/*.cdl", dir.path().display());
    let err = open_mfdataset(&CdlReader::new(), &SourceSet::pattern(pattern.clone()), &OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::NoSources { pattern: Some(ref p) } if *p == pattern));

    let err = open_mfdataset(&CdlReader::new(), &SourceSet::paths(Vec::<String>::new()), &OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::NoSources { pattern: None }));
    Ok(())
}

#[tokio::test]
async fn test_incompatible_variables_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    let a = cdl_text(&daily(0, 5), "days since 2000-01-01", "standard", &["A", "B"], 2, "a");
    let b = cdl_text(&daily(5, 5), "days since 2000-01-01", "standard", &["A", "C"], 2, "b");
    let paths = vec![
        write_source(dir.path(), "a.cdl", &a).await?,
        write_source(dir.path(), "b.cdl", &b).await?,
    ];

    let err = open_mfdataset(&CdlReader::new(), &SourceSet::paths(paths), &OpenOptions::default())
        .await
        .unwrap_err();
    match err {
        FederationError::VariableMismatch {
            source_index,
            missing,
            extra,
            ..
        } => {
            assert_eq!(source_index, 1);
            assert_eq!(missing.into_iter().collect::<Vec<_>>(), vec!["B"]);
            assert_eq!(extra.into_iter().collect::<Vec<_>>(), vec!["C"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_dimension_sizes_checked_unless_relaxed() -> Result<()> {
    let dir = tempdir()?;
    let a = cdl_text(&daily(0, 5), "days since 2000-01-01", "standard", &["tas"], 2, "a");
    let b = cdl_text(&daily(5, 5), "days since 2000-01-01", "standard", &["tas"], 4, "b");
    let sources = SourceSet::paths(vec![
        write_source(dir.path(), "a.cdl", &a).await?,
        write_source(dir.path(), "b.cdl", &b).await?,
    ]);

    let err = open_mfdataset(&CdlReader::new(), &sources, &OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FederationError::DimensionSizeMismatch { ref dim, expected: 2, actual: 4, .. } if dim == "lat"
    ));

    let relaxed = OpenOptions {
        strict_dimensions: false,
        ..Default::default()
    };
    let ds = open_mfdataset(&CdlReader::new(), &sources, &relaxed).await?;
    assert_eq!(ds.dims["lat"], 2);
    assert_eq!(ds.dims["time"], 10);
    Ok(())
}

#[tokio::test]
async fn test_unreadable_source_fails_the_open() -> Result<()> {
    let dir = tempdir()?;
    let mut paths = three_daily_sources(dir.path()).await?;
    paths.insert(1, dir.path().join("missing.cdl").to_string_lossy().to_string());

    let err = open_mfdataset(&CdlReader::new(), &SourceSet::paths(paths), &OpenOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, FederationError::Read { ref path, .. } if path.ends_with("missing.cdl")));
    Ok(())
}

#[tokio::test]
async fn test_irregular_series_has_no_frequency() -> Result<()> {
    let dir = tempdir()?;
    let values = [0.0, 1.0, 2.0, 4.0, 5.0];
    let text = cdl_text(&values, "days since 2000-01-01", "standard", &["tas"], 1, "gappy");
    let path = write_source(dir.path(), "gappy.cdl", &text).await?;

    let ds = open_mfdataset(&CdlReader::new(), &SourceSet::paths([path]), &OpenOptions::default()).await?;
    assert!(!ds.coords["time"].attrs.contains_key("frequency"));

    let err = groupby_time(&ds, "1M".parse()?, "time", true).unwrap_err();
    assert!(matches!(err, FederationError::MissingAttribute { ref attr, .. } if attr == "frequency"));
    Ok(())
}

#[tokio::test]
async fn test_hourly_sources() -> Result<()> {
    let dir = tempdir()?;
    let hours: Vec<f64> = (0..48).map(f64::from).collect();
    let first = cdl_text(&hours[..24], "hours since 2000-01-01 00:00:00", "standard", &["tas"], 1, "d1");
    let second = cdl_text(&hours[24..], "hours since 2000-01-01 00:00:00", "standard", &["tas"], 1, "d2");
    let sources = SourceSet::paths(vec![
        write_source(dir.path(), "d1.cdl", &first).await?,
        write_source(dir.path(), "d2.cdl", &second).await?,
    ]);

    let ds = open_mfdataset(&CdlReader::new(), &sources, &OpenOptions::default()).await?;
    assert_eq!(ds.coords["time"].attrs["frequency"], AttrValue::from("1H"));

    let groups = groupby_time(&ds, "6H".parse()?, "time", true)?;
    assert_eq!(groups.len(), 8);
    assert!(groups.iter().all(|g| g.description.dims["time"] == 6));
    assert_eq!(
        groups[1].description.coords["time"].attrs["units"],
        AttrValue::from("hours since 2000-01-01 06:00:00")
    );
    Ok(())
}

#[tokio::test]
async fn test_month_groups_use_real_month_lengths() -> Result<()> {
    let dir = tempdir()?;
    let cases = [
        ("standard", 366, vec![31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]),
        ("noleap", 365, vec![31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]),
        ("360_day", 360, vec![30; 12]),
    ];
    for (calendar, days, expected) in cases {
        let text = cdl_text(&daily(0, days), "days since 2000-01-01", calendar, &["tas"], 1, calendar);
        let path = write_source(dir.path(), &format!("{calendar}.cdl"), &text).await?;
        let ds = open_mfdataset(&CdlReader::new(), &SourceSet::paths([path]), &OpenOptions::default()).await?;

        let groups = groupby_time(&ds, "1M".parse()?, "time", true)?;
        let sizes: Vec<usize> = groups.iter().map(|g| g.description.dims["time"]).collect();
        assert_eq!(sizes, expected, "{calendar}");
    }
    Ok(())
}

#[tokio::test]
async fn test_decade_groups_clip_to_axis_end() -> Result<()> {
    let dir = tempdir()?;
    // 2000-01-01 .. 2025-01-01 in days
    let text = cdl_text(&daily(0, 9132), "days since 2000-01-01", "standard", &["tas"], 1, "long");
    let path = write_source(dir.path(), "long.cdl", &text).await?;
    let ds = open_mfdataset(&CdlReader::new(), &SourceSet::paths([path]), &OpenOptions::default()).await?;

    let groups = groupby_time(&ds, "10Y".parse()?, "time", false)?;
    let sizes: Vec<usize> = groups.iter().map(|g| g.description.dims["time"]).collect();
    assert_eq!(sizes, vec![3653, 3652, 1827]);
    assert_eq!(groups[2].period.end.to_string(), "2025-01-01 00:00:00");
    Ok(())
}

/// Serves CDL text from memory
struct InMemory {
    files: HashMap<String, String>,
}

#[async_trait]
impl MetadataProvider for InMemory {
    async fn read(&self, source: &str, concat_dim: &str) -> gridfed::Result<PerFileMetadata> {
        let text = self.files.get(source).ok_or_else(|| FederationError::Read {
            path: source.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        gridfed::cdl::parse_cdl(source, text, concat_dim)
    }
}

#[tokio::test]
async fn test_custom_provider_with_serial_reads() -> Result<()> {
    let files: HashMap<String, String> = (0..5)
        .map(|i| {
            let name = format!("mem://{i}");
            let text = cdl_text(&daily(i * 4, 4), "days since 2000-01-01", "noleap", &["pr"], 1, &name);
            (name, text)
        })
        .collect();
    let provider = InMemory { files };
    let options = OpenOptions {
        concurrency: 1,
        ..Default::default()
    };
    let ids: Vec<String> = (0..5).map(|i| format!("mem://{i}")).collect();

    let ds = open_mfdataset(&provider, &SourceSet::paths(ids.clone()), &options).await?;
    assert_eq!(ds.dims["time"], 20);
    assert_eq!(ds.registry.query(None), ids);
    assert_eq!(ds.coords["time"].attrs["calendar"], AttrValue::from("noleap"));
    Ok(())
}

/// Earlier sources answer later: source i waits 50 * (5 - i) ms
struct SlowFirst {
    inner: InMemory,
}

#[async_trait]
impl MetadataProvider for SlowFirst {
    async fn read(&self, source: &str, concat_dim: &str) -> gridfed::Result<PerFileMetadata> {
        let index: u64 = source
            .trim_start_matches("mem://")
            .parse()
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(50 * (5 - index))).await;
        self.inner.read(source, concat_dim).await
    }
}

#[tokio::test]
async fn test_out_of_order_reads_keep_source_order() -> Result<()> {
    let files: HashMap<String, String> = (0..5)
        .map(|i| {
            let name = format!("mem://{i}");
            let text = cdl_text(&daily(i * 3, 3), "days since 2000-01-01", "standard", &["tas"], 2, &i.to_string());
            (name, text)
        })
        .collect();
    let provider = SlowFirst {
        inner: InMemory { files },
    };
    let options = OpenOptions {
        concurrency: 5,
        ..Default::default()
    };
    let ids: Vec<String> = (0..5).map(|i| format!("mem://{i}")).collect();

    let ds = open_mfdataset(&provider, &SourceSet::paths(ids.clone()), &options).await?;
    assert_eq!(ds.registry.query(None), ids);
    assert_eq!(ds.attrs["title"], AttrValue::from("0"));
    assert_eq!(ds.dims["time"], 15);
    Ok(())
}
