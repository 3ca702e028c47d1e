use anyhow::Result;
use httpmock::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use traffic_etl::{BatchRunner, CliConfig, HttpGeocoder, OutputMode, TomlConfig};
use traffic_etl::domain::ports::ConfigProvider;

fn config_for(input: &Path, output: &Path, mode: OutputMode) -> CliConfig {
    CliConfig {
        input_dir: input.to_string_lossy().into_owned(),
        output_dir: output.to_string_lossy().into_owned(),
        mode,
        ..CliConfig::default()
    }
}

fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[tokio::test]
async fn test_two_files_share_one_schema() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input)?;
    fs::write(input.join("a.csv"), "Data,Hora,Tipo\n01/03/2024,14:5,Colisão\n")?;
    fs::write(input.join("b.txt"), "data;situacao\n2024-03-02;Resolvido\n")?;

    let runner = BatchRunner::new(config_for(&input, &output, OutputMode::Unified));
    let run = runner.run().await?;

    assert_eq!(run.files_total, 2);
    assert_eq!(run.files_succeeded, 2);
    assert_eq!(run.rows_written, 2);
    assert_eq!(run.rows_failed, 0);
    assert_eq!(run.schema_columns, 4);

    let a = read_rows(&output.join("a.csv"))?;
    assert_eq!(a[0], vec!["data", "hora", "situacao", "tipo"]);
    assert_eq!(a[1], vec!["2024-03-01", "14:05:00", "", "Colisão"]);

    let b = read_rows(&output.join("b.csv"))?;
    assert_eq!(b[0], vec!["data", "hora", "situacao", "tipo"]);
    assert_eq!(b[1], vec!["2024-03-02", "", "Resolvido", ""]);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_row_and_failed_file_do_not_stop_batch() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input)?;

    let mut broken = b"data\tvitimas\n2024-01-01\t1\n".to_vec();
    broken.extend_from_slice(b"2024-01-02\t\xc3\x28\n");
    broken.extend_from_slice(b"2024-01-03\t2,5\n");
    fs::write(input.join("a_broken.tsv"), broken)?;
    fs::write(input.join("z_clean.csv"), "data,vitimas\n2024-02-01,4\n")?;

    // 輸出目錄下同名資料夾讓 b 檔無法寫入
    fs::create_dir_all(output.join("m_blocked.csv"))?;
    fs::write(input.join("m_blocked.csv"), "data,vitimas\n2024-03-01,1\n")?;

    let run = BatchRunner::new(config_for(&input, &output, OutputMode::Unified))
        .run()
        .await?;

    assert_eq!(run.files_total, 3);
    assert_eq!(run.files_succeeded, 2);
    assert_eq!(run.failed_files.len(), 1);
    assert!(run.failed_files[0].0.ends_with("m_blocked.csv"));
    assert_eq!(run.rows_failed, 1);
    assert_eq!(run.rows_written, 3);

    let broken_rows = read_rows(&output.join("a_broken.csv"))?;
    assert_eq!(broken_rows.len(), 3);
    assert_eq!(broken_rows[2], vec!["2024-01-03", "2.5"]);

    let clean_rows = read_rows(&output.join("z_clean.csv"))?;
    assert_eq!(clean_rows[1], vec!["2024-02-01", "4"]);
    for row in broken_rows.iter().chain(clean_rows.iter()) {
        assert_eq!(row.len(), run.schema_columns);
    }
    Ok(())
}

#[tokio::test]
async fn test_same_stem_inputs_do_not_overwrite_each_other() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input)?;
    fs::write(input.join("a.csv"), "data\n2024-03-01\n")?;
    fs::write(input.join("a.tsv"), "data\n2024-04-01\n")?;

    let run = BatchRunner::new(config_for(&input, &output, OutputMode::Unified))
        .run()
        .await?;

    assert_eq!(run.files_total, 2);
    assert_eq!(run.files_succeeded, 1);
    assert_eq!(run.rows_written, 1);
    assert_eq!(run.failed_files.len(), 1);
    assert!(run.failed_files[0].0.ends_with("a.tsv"));
    assert!(run.failed_files[0].1.contains("a.csv"));

    let rows = read_rows(&output.join("a.csv"))?;
    assert_eq!(rows, vec![vec!["data".to_string()], vec!["2024-03-01".to_string()]]);
    Ok(())
}

#[tokio::test]
async fn test_output_dir_equal_to_input_dir_keeps_inputs() -> Result<()> {
    let temp = TempDir::new()?;
    let dir = temp.path().join("data");
    fs::create_dir(&dir)?;
    fs::write(dir.join("a.csv"), "data,vitimas\n2024-03-01,1\n")?;
    fs::write(dir.join("b.txt"), "data;vitimas\n2024-03-02;2\n")?;

    let run = BatchRunner::new(config_for(&dir, &dir, OutputMode::Unified))
        .run()
        .await?;

    assert_eq!(run.files_succeeded, 1);
    assert_eq!(run.failed_files.len(), 1);
    assert!(run.failed_files[0].0.ends_with("a.csv"));
    assert_eq!(fs::read_to_string(dir.join("a.csv"))?, "data,vitimas\n2024-03-01,1\n");

    let rows = read_rows(&dir.join("b.csv"))?;
    assert_eq!(rows[1], vec!["2024-03-02", "2"]);
    Ok(())
}

#[tokio::test]
async fn test_ndjson_mode_from_toml() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input)?;
    fs::write(
        input.join("2019.csv"),
        "DATA;hora;natureza_acidente;situacao;bairro\n\
         2019-05-10;08:15:00.000;COM VÍTIMA;FINALIZADA;BOA VIAGEM\n\
         ;09:00;SEM VÍTIMA;CANCELADA;IBURA\n",
    )?;

    let toml = format!(
        r#"
[input]
dir = "{}"

[output]
dir = "{}"
mode = "ndjson"
"#,
        input.to_string_lossy().replace('\\', "/"),
        output.to_string_lossy().replace('\\', "/")
    );
    let config = TomlConfig::from_toml_str(&toml)?;
    assert_eq!(config.output_mode(), OutputMode::Ndjson);

    let run = BatchRunner::new(config).run().await?;
    assert_eq!(run.rows_written, 1);
    assert_eq!(run.rows_failed, 1);

    let content = fs::read_to_string(output.join("2019.ndjson"))?;
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(serde_json::from_str)
        .collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines.len(), 1);
    assert_eq!(
        lines[0],
        serde_json::json!({
            "tipo": "COM VÍTIMA",
            "situacao": "FINALIZADA",
            "datahora": "2019-05-10T08:15:00-03:00",
            "meta": "{\"bairro\":\"BOA VIAGEM\"}"
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_geocoding_adds_coordinate_columns() -> Result<()> {
    let temp = TempDir::new()?;
    let input = temp.path().join("input");
    let output = temp.path().join("output");
    fs::create_dir(&input)?;
    fs::write(
        input.join("geo.csv"),
        "endereco;numero;bairro;vitimas\n\
         AV BOA VIAGEM;1200;BOA VIAGEM;1\n\
         ;;IBURA;0\n\
         RUA INEXISTENTE;;CORDEIRO;2\n",
    )?;

    let server = MockServer::start();
    let found = server.mock(|when, then| {
        when.method(GET)
            .path("/geocode/json")
            .query_param("address", "AV BOA VIAGEM, 1200, BOA VIAGEM, Recife, PE");
        then.status(200).json_body(serde_json::json!({
            "status": "OK",
            "results": [{"geometry": {"location": {"lat": -8.1198, "lng": -34.8958}}}]
        }));
    });
    let missing = server.mock(|when, then| {
        when.method(GET)
            .path("/geocode/json")
            .query_param("address", "RUA INEXISTENTE, CORDEIRO, Recife, PE");
        then.status(200)
            .json_body(serde_json::json!({"status": "ZERO_RESULTS", "results": []}));
    });

    let config = CliConfig {
        geocode: true,
        geocoding_endpoint: server.url("/geocode/json"),
        geocoding_api_key: Some("test-key".to_string()),
        locality: Some("Recife, PE".to_string()),
        ..config_for(&input, &output, OutputMode::Unified)
    };
    let settings = config.geocoding().expect("geocoding enabled");

    let run = BatchRunner::new(config)
        .with_geocoder(Box::new(HttpGeocoder::new(&settings)))
        .run()
        .await?;

    found.assert();
    missing.assert();
    assert_eq!(run.rows_written, 3);

    let rows = read_rows(&output.join("geo.csv"))?;
    assert_eq!(
        rows[0],
        vec!["bairro", "endereco", "latitude", "longitude", "numero", "vitimas"]
    );
    assert_eq!(
        rows[1],
        vec!["BOA VIAGEM", "AV BOA VIAGEM", "-8.1198", "-34.8958", "1200", "1"]
    );
    assert_eq!(rows[2], vec!["IBURA", "", "", "", "", "0"]);
    assert_eq!(rows[3], vec!["CORDEIRO", "RUA INEXISTENTE", "", "", "", "2"]);
    Ok(())
}

#[tokio::test]
async fn test_missing_input_directory_is_an_error() {
    let temp = TempDir::new().unwrap();
    let runner = BatchRunner::new(config_for(
        &temp.path().join("nope"),
        &temp.path().join("out"),
        OutputMode::Unified,
    ));
    assert!(runner.run().await.is_err());
}
