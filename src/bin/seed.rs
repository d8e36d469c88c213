use std::error::Error;
use std::sync::Arc;

use clap::Parser;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Sentence, Words};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::seq::SliceRandom;
use rand::Rng;

use vidtube::config::ScyllaSettings;
use vidtube::db;
use vidtube::models::{Tweet, User, Video};
use vidtube::repository::Repository;
use vidtube::store::{Edge, EdgeKind, ScyllaStore};

/// Fills a ScyllaDB keyspace with fake channels, videos, tweets, likes and
/// subscriptions.
#[derive(Debug, Parser)]
#[command(name = "seed")]
struct SeedArgs {
    #[arg(long, env = "VIDTUBE_SCYLLA_NODES", value_delimiter = ',', default_value = "127.0.0.1:9042")]
    nodes: Vec<String>,

    #[arg(long, env = "VIDTUBE_SCYLLA_KEYSPACE", default_value = "vidtube")]
    keyspace: String,

    #[arg(long, default_value_t = 50)]
    users: usize,

    #[arg(long, default_value_t = 5)]
    videos_per_user: usize,

    #[arg(long, default_value_t = 10)]
    tweets_per_user: usize,

    /// Password shared by every seeded account.
    #[arg(long, default_value = "password123")]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = SeedArgs::parse();
    println!("Starting data seeding...");

    let settings = ScyllaSettings {
        known_nodes: args.nodes.clone(),
        keyspace: args.keyspace.clone(),
        replication_factor: 1,
    };
    let session = db::create_session(&settings).await?;
    db::ensure_schema(&session, &settings).await?;
    let store = Arc::new(ScyllaStore::new(Arc::new(session), settings.keyspace));
    let repo = Repository::new(store);

    let users = seed_users(&repo, &args).await?;
    let videos = seed_videos(&repo, &users, args.videos_per_user).await?;
    seed_tweets(&repo, &users, args.tweets_per_user).await?;
    seed_relations(&repo, &users, &videos).await?;

    println!("Seeding completed!");
    Ok(())
}

async fn seed_users(repo: &Repository, args: &SeedArgs) -> Result<Vec<User>, Box<dyn Error>> {
    println!("Creating {} users...", args.users);
    // One hash for everyone; bcrypt at default cost is slow.
    let password_hash = bcrypt::hash(&args.password, bcrypt::DEFAULT_COST)?;
    let mut users = Vec::with_capacity(args.users);

    for i in 0..args.users {
        let username: String = Username().fake();
        let username = format!("{username}{i}");
        let email: String = SafeEmail().fake();
        let email = format!("{i}.{email}");
        let full_name: String = Name().fake();
        let user = User::new(
            &username,
            &email,
            &full_name,
            format!("https://picsum.photos/seed/{username}/200"),
            None,
            password_hash.clone(),
        );
        repo.insert(&user).await?;
        println!("Created user {}/{}: {} ({})", i + 1, args.users, user.username, user.id);
        users.push(user);
    }

    Ok(users)
}

async fn seed_videos(
    repo: &Repository,
    users: &[User],
    per_user: usize,
) -> Result<Vec<Video>, Box<dyn Error>> {
    println!("Creating {} videos per user...", per_user);
    let mut videos = Vec::with_capacity(users.len() * per_user);
    let mut rng = rand::thread_rng();

    for user in users {
        for _ in 0..per_user {
            let title: Vec<String> = Words(2..6).fake();
            let mut video = Video::new(
                user.id,
                title.join(" "),
                Sentence(5..15).fake(),
                format!("https://media.example.com/{}.mp4", user.id),
                format!("https://picsum.photos/seed/{}/640/360", user.id),
                rng.gen_range(10.0..1_800.0),
            );
            video.views = rng.gen_range(0..10_000);
            video.is_published = rng.gen_bool(0.9);
            repo.insert(&video).await?;
            videos.push(video);
        }
    }

    println!("Created {} videos", videos.len());
    Ok(videos)
}

async fn seed_tweets(
    repo: &Repository,
    users: &[User],
    per_user: usize,
) -> Result<(), Box<dyn Error>> {
    println!("Creating {} tweets per user...", per_user);
    let total = users.len() * per_user;
    let mut created = 0;

    for user in users {
        for _ in 0..per_user {
            let tweet = Tweet::new(user.id, Sentence(3..10).fake());
            repo.insert(&tweet).await?;
            created += 1;
            if created % 100 == 0 {
                println!("Created {}/{} tweets", created, total);
            }
        }
    }

    Ok(())
}

/// Random subscriptions between users and likes on published videos.
async fn seed_relations(
    repo: &Repository,
    users: &[User],
    videos: &[Video],
) -> Result<(), Box<dyn Error>> {
    println!("Creating subscriptions and likes...");
    let store = repo.store();
    let published: Vec<&Video> = videos.iter().filter(|video| video.is_published).collect();
    let mut rng = rand::thread_rng();
    let mut edges = 0;

    for user in users {
        let channels = users.choose_multiple(&mut rng, 5.min(users.len()));
        for channel in channels.filter(|channel| channel.id != user.id) {
            if store
                .insert_edge(&Edge::new(EdgeKind::Subscription, user.id, channel.id))
                .await?
            {
                edges += 1;
            }
        }
        for video in published.choose_multiple(&mut rng, 10.min(published.len())) {
            if store
                .insert_edge(&Edge::new(EdgeKind::VideoLike, user.id, video.id))
                .await?
            {
                edges += 1;
            }
        }
    }

    println!("Created {} relations", edges);
    Ok(())
}
