use clap::Subcommand;

use crate::cli::OutputFormat;
use crate::storage::{self, StorageClient};

#[derive(Subcommand)]
pub enum StorageCommands {
    #[command(about = "Public URL of a stored object")]
    PublicUrl {
        #[arg(help = "Object file name")]
        file: String,
        #[arg(long, help = "Folder inside the bucket")]
        folder: Option<String>,
        #[arg(long, help = "Bucket (defaults to GCS_BUCKET_NAME)")]
        bucket: Option<String>,
    },

    #[command(about = "Signed GET URL of a private object")]
    Sign {
        #[arg(help = "Object file name")]
        file: String,
        #[arg(long, help = "Folder inside the bucket")]
        folder: Option<String>,
        #[arg(long, help = "Bucket (defaults to GCS_BUCKET_NAME)")]
        bucket: Option<String>,
    },

    #[command(about = "Split a stored URL into bucket, folder and file name")]
    FileInfo {
        #[arg(help = "Object URL")]
        url: String,
    },

    #[command(about = "Object name an upload would be stored under")]
    ObjectName {
        #[arg(help = "Logical file path of the upload")]
        path: String,
        #[arg(help = "Upload hash")]
        hash: String,
        #[arg(help = "File extension, including the dot")]
        ext: String,
    },
}

pub fn handle(cmd: StorageCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = StorageClient::from_config();

    match cmd {
        StorageCommands::PublicUrl { file, folder, bucket } => {
            print_value(output_format, "url", &client.public_url(&file, folder.as_deref(), bucket.as_deref()));
        }
        StorageCommands::Sign { file, folder, bucket } => {
            let url = client.try_signed_url(&file, folder.as_deref(), bucket.as_deref(), chrono::Utc::now())?;
            print_value(output_format, "url", &url);
        }
        StorageCommands::FileInfo { url } => {
            let info = storage::file_info_from_url(Some(&url));
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&info)?),
                OutputFormat::Text => {
                    println!("bucket:   {}", info.bucket.as_deref().unwrap_or("-"));
                    println!("folder:   {}", info.folder_path.as_deref().unwrap_or("-"));
                    println!("filename: {}", info.filename.as_deref().unwrap_or("-"));
                }
            }
        }
        StorageCommands::ObjectName { path, hash, ext } => {
            print_value(output_format, "objectName", &storage::upload_object_name(&path, &hash, &ext)?);
        }
    }
    Ok(())
}

fn print_value(output_format: OutputFormat, key: &str, value: &str) {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::json!({ key: value })),
        OutputFormat::Text => println!("{}", value),
    }
}
