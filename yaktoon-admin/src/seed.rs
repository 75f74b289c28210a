//! Demo catalog: influencers, products and community posts

use anyhow::Result;
use serde_json::{json, Map, Value};
use tracing::info;
use yaktoon_common::models::{HashRecord, Influencer, InfluencerStats, Post, PostStats, Product};
use yaktoon_common::{keys, time, Store};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

struct SeedInfluencer {
    slug: &'static str,
    name: &'static str,
    bio: &'static str,
    subjects: &'static [&'static str],
    tags: &'static [&'static str],
    followers: i64,
    rating: f64,
    reviews: i64,
    students: i64,
    courses: i64,
    socials: &'static [(&'static str, &'static str)],
    joined_days_ago: i64,
}

const INFLUENCERS: &[SeedInfluencer] = &[
    SeedInfluencer {
        slug: "jane-doe",
        name: "Jane Doe",
        bio: "CS @ SKY, 알고리즘 멘토",
        subjects: &["컴퓨터과학", "알고리즘"],
        tags: &["알고리즘", "면접", "PS"],
        followers: 15200,
        rating: 4.8,
        reviews: 123,
        students: 1200,
        courses: 4,
        socials: &[("youtube", "https://youtube.com/@janedoe")],
        joined_days_ago: 365,
    },
    SeedInfluencer {
        slug: "john-smith",
        name: "John Smith",
        bio: "경영학 @ SKY, 경영전략 전문가",
        subjects: &["경영학", "전략기획"],
        tags: &["경영전략", "컨설팅", "MBA"],
        followers: 8900,
        rating: 4.6,
        reviews: 87,
        students: 650,
        courses: 3,
        socials: &[("instagram", "https://instagram.com/johnsmith")],
        joined_days_ago: 200,
    },
    SeedInfluencer {
        slug: "amy-lee",
        name: "Amy Lee",
        bio: "의대생 @ SKY, MCAT 만점자",
        subjects: &["의학", "생명과학"],
        tags: &["의대입시", "MCAT", "생명과학"],
        followers: 12800,
        rating: 4.9,
        reviews: 156,
        students: 890,
        courses: 5,
        socials: &[
            ("youtube", "https://youtube.com/@amylee"),
            ("instagram", "https://instagram.com/amylee"),
        ],
        joined_days_ago: 180,
    },
    SeedInfluencer {
        slug: "david-kim",
        name: "David Kim",
        bio: "법학 @ SKY, 로스쿨 진학 전문가",
        subjects: &["법학", "정치학"],
        tags: &["로스쿨", "LEET", "법학"],
        followers: 7200,
        rating: 4.5,
        reviews: 92,
        students: 420,
        courses: 2,
        socials: &[("youtube", "https://youtube.com/@davidkim")],
        joined_days_ago: 150,
    },
    SeedInfluencer {
        slug: "sarah-park",
        name: "Sarah Park",
        bio: "수학교육 @ SKY, 수학 올림피아드 금메달",
        subjects: &["수학", "수학교육"],
        tags: &["수학", "올림피아드", "입시수학"],
        followers: 18500,
        rating: 4.7,
        reviews: 203,
        students: 1800,
        courses: 6,
        socials: &[
            ("youtube", "https://youtube.com/@sarahpark"),
            ("twitter", "https://twitter.com/sarahpark"),
        ],
        joined_days_ago: 300,
    },
    SeedInfluencer {
        slug: "michael-cho",
        name: "Michael Cho",
        bio: "물리학 @ SKY, 이론물리학 연구자",
        subjects: &["물리학", "천체물리학"],
        tags: &["물리", "과학", "연구"],
        followers: 6800,
        rating: 4.8,
        reviews: 74,
        students: 380,
        courses: 3,
        socials: &[("youtube", "https://youtube.com/@michaelcho")],
        joined_days_ago: 120,
    },
];

/// (id, slug, title, price, level, summary, days ago)
const PRODUCTS: &[(&str, &str, &str, i64, &str, &str, i64)] = &[
    ("p1", "jane-doe", "PS 초격차 패키지", 49000, "intermediate", "알고리즘 문제해결 능력을 한 단계 업그레이드", 30),
    ("p2", "jane-doe", "코딩테스트 완전정복", 79000, "advanced", "대기업 코딩테스트 통과를 위한 완벽 가이드", 45),
    ("p3", "john-smith", "경영전략 기초부터 실전까지", 65000, "beginner", "경영전략의 핵심 개념과 실무 적용법", 20),
    ("p4", "amy-lee", "MCAT 만점 전략", 89000, "advanced", "MCAT 만점자의 노하우와 학습법", 60),
    ("p5", "sarah-park", "수학 올림피아드 정복", 55000, "advanced", "수학 올림피아드 금메달리스트의 문제해결법", 15),
];

/// (id, author, title, body, tags, likes, comments, days ago)
const POSTS: &[(&str, &str, &str, &str, &[&str], i64, i64, i64)] = &[
    (
        "post1",
        "user1",
        "SKY 합격 후기 - 수시 전형 준비법",
        "안녕하세요! 올해 SKY 대학에 합격한 학생입니다. 수시 전형 준비 과정에서 도움이 되었던 경험들을 공유하고자 합니다...",
        &["수시", "합격후기", "SKY"],
        42,
        8,
        5,
    ),
    (
        "post2",
        "user2",
        "의대 입시 준비 - 생명과학 공부법",
        "의대 입시를 준비하는 학생들을 위한 생명과학 효율적 공부법을 소개합니다...",
        &["의대", "생명과학", "입시"],
        28,
        12,
        3,
    ),
];

/// Counts written by [`seed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub influencers: usize,
    pub products: usize,
    pub posts: usize,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn influencer_record(seed: &SeedInfluencer) -> Influencer {
    let mut extra = Map::new();
    extra.insert("rating".to_string(), json!(seed.rating));
    extra.insert("reviews".to_string(), json!(seed.reviews));
    extra.insert("students".to_string(), json!(seed.students));
    extra.insert("courses".to_string(), json!(seed.courses));

    Influencer {
        id: seed.slug.to_string(),
        slug: seed.slug.to_string(),
        name: seed.name.to_string(),
        username: seed.slug.replace('-', ""),
        avatar: format!("/avatars/{}.jpg", seed.slug.split('-').next().unwrap_or(seed.slug)),
        bio: seed.bio.to_string(),
        tags: strings(seed.tags),
        stats: InfluencerStats {
            followers: seed.followers,
            paid_courses: seed.courses,
            extra,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Flush the database and write the demo catalog
pub async fn seed(store: &dyn Store) -> Result<SeedSummary> {
    store.flushdb().await?;
    let now = time::now_millis();

    for seed in INFLUENCERS {
        let influencer = influencer_record(seed);
        let socials: Map<String, Value> = seed
            .socials
            .iter()
            .map(|(network, url)| (network.to_string(), json!(url)))
            .collect();

        let mut fields = influencer.to_fields();
        fields.push(("subjects", serde_json::to_string(seed.subjects)?));
        fields.push(("socials", Value::Object(socials).to_string()));
        fields.push(("joinDate", (now - seed.joined_days_ago * DAY_MILLIS).to_string()));
        fields.push(("updatedAt", now.to_string()));

        store.hset(&keys::influencer(seed.slug), &fields).await?;
        store.sadd(keys::INFLUENCERS, seed.slug).await?;
        store
            .zadd(keys::INFLUENCERS_TRENDING, seed.slug, seed.followers as f64)
            .await?;
    }

    for &(id, slug, title, price, level, summary, days_ago) in PRODUCTS {
        let product = Product {
            id: id.to_string(),
            influencer_slug: slug.to_string(),
            title: title.to_string(),
            price,
            level: level.to_string(),
            thumbnail: format!("/thumbs/{}.jpg", id),
            summary: summary.to_string(),
            description: None,
            created_at: now - days_ago * DAY_MILLIS,
        };
        store.hset(&keys::product(id), &product.to_fields()).await?;
        store.sadd(&keys::influencer_products(slug), id).await?;
    }

    for &(id, author, title, body, tags, likes, comments, days_ago) in POSTS {
        let post = Post {
            id: id.to_string(),
            author_id: author.to_string(),
            community_type: "high".to_string(),
            title: title.to_string(),
            body: body.to_string(),
            tags: strings(tags),
            created_at: now - days_ago * DAY_MILLIS,
            stats: PostStats {
                likes,
                comments,
                views: None,
            },
        };
        store.hset(&keys::post(id), &post.to_fields()).await?;
        store.lpush(keys::COMMUNITY_POSTS, id).await?;
    }

    let summary = SeedSummary {
        influencers: INFLUENCERS.len(),
        products: PRODUCTS.len(),
        posts: POSTS.len(),
    };
    info!(?summary, "Seeded demo catalog");
    Ok(summary)
}

/// What `verify` found in the store
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    pub influencers: usize,
    pub products: usize,
    pub posts: usize,
    /// Name and follower count of one influencer, if any
    pub sample: Option<(String, i64)>,
}

pub async fn verify(store: &dyn Store) -> Result<VerifyReport> {
    let mut slugs = store.smembers(keys::INFLUENCERS).await?;
    slugs.sort();

    let products = store
        .keys("product:*")
        .await?
        .into_iter()
        .filter(|k| k.matches(':').count() == 1)
        .count();
    let posts = store.llen(keys::COMMUNITY_POSTS).await?;

    let sample = match slugs.first() {
        Some(slug) => {
            let hash = store.hgetall(&keys::influencer(slug)).await?;
            (!hash.is_empty()).then(|| {
                let influencer = Influencer::from_hash(&hash);
                (influencer.name, influencer.stats.followers)
            })
        }
        None => None,
    };

    Ok(VerifyReport {
        influencers: slugs.len(),
        products,
        posts: usize::try_from(posts).unwrap_or(0),
        sample,
    })
}

/// Delete every key the seed writes, keeping other data. Returns keys removed.
pub async fn rollback(store: &dyn Store) -> Result<usize> {
    let mut removed = 0;
    for pattern in keys::SEED_PATTERNS {
        let matched = store.keys(pattern).await?;
        if !matched.is_empty() {
            info!(pattern, count = matched.len(), "Removing seed keys");
        }
        for key in matched {
            if store.del(&key).await? {
                removed += 1;
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yaktoon_common::MemoryStore;

    #[tokio::test]
    async fn test_seed_then_verify() {
        let store = MemoryStore::new();
        store.set("stale", "1").await.unwrap();

        let summary = seed(&store).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                influencers: 6,
                products: 5,
                posts: 2
            }
        );
        assert!(store.get("stale").await.unwrap().is_none());

        let report = verify(&store).await.unwrap();
        assert_eq!(report.influencers, 6);
        assert_eq!(report.products, 5);
        assert_eq!(report.posts, 2);
        assert_eq!(report.sample, Some(("Amy Lee".to_string(), 12800)));

        let jane = Influencer::from_hash(&store.hgetall("influencer:jane-doe").await.unwrap());
        assert_eq!(jane.username, "janedoe");
        assert_eq!(jane.stats.extra["rating"], json!(4.8));

        let products = store.smembers("influencer:jane-doe:products").await.unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn test_rollback_keeps_unrelated_keys() {
        let store = MemoryStore::new();
        seed(&store).await.unwrap();
        store.set("user:email:a@example.com", "u1").await.unwrap();

        let removed = rollback(&store).await.unwrap();
        // 6 influencer hashes, 4 product sets, influencers, trending, 5 products, 2 posts, list
        assert_eq!(removed, 20);
        assert!(store.exists("user:email:a@example.com").await.unwrap());

        let report = verify(&store).await.unwrap();
        assert_eq!(report.influencers, 0);
        assert_eq!(report.products, 0);
        assert_eq!(report.posts, 0);
    }
}
