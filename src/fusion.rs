use std::collections::HashMap;
use std::collections::hash_map::Entry;

use log::debug;

use crate::db::Image;

struct Ranked {
    image: Image,
    score: f32,
}

/// 按名次为结果打分：第 i 个结果的分数为 `limit - i`，最低为 0
fn rank_score(limit: usize, i: usize) -> f32 {
    limit.saturating_sub(i) as f32
}

/// 合并图片搜索和文本搜索的结果
///
/// 两组结果各自按名次打分。只出现在一组中的结果分数减半，两组都出现的结果分数相加，
/// 距离取平均值。最后按分数降序排列（分数相同时保持原有顺序），截取前 `limit` 个。
/// 两种模态的距离不可比较，因此这里只使用名次。
pub fn combine(res_image: Vec<Image>, res_text: Vec<Image>, limit: usize) -> Vec<Image> {
    let mut ranked: Vec<Ranked> = Vec::with_capacity(res_image.len() + res_text.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut in_text = vec![];

    for (i, image) in res_image.into_iter().enumerate() {
        // 同一组中重复出现的名称只保留排名最高的一个
        if let Entry::Vacant(entry) = index.entry(image.name.clone()) {
            entry.insert(ranked.len());
            ranked.push(Ranked { image, score: rank_score(limit, i) });
        }
    }
    let image_count = ranked.len();
    in_text.resize(image_count, false);

    for (i, image) in res_text.into_iter().enumerate() {
        let score = rank_score(limit, i);
        match index.get(&image.name) {
            Some(&pos) if pos < image_count => {
                if in_text[pos] {
                    continue;
                }
                in_text[pos] = true;
                let item = &mut ranked[pos];
                item.score += score;
                if let (Some(a), Some(b)) = (item.image.distance, image.distance) {
                    item.image.distance = Some((a + b) / 2.);
                }
            }
            Some(_) => {}
            None => {
                debug!("只出现在文本搜索结果中: {}", image.name);
                index.insert(image.name.clone(), ranked.len());
                ranked.push(Ranked { image, score: score / 2. });
            }
        }
    }

    for (item, _) in ranked.iter_mut().zip(&in_text).filter(|(_, found)| !**found) {
        debug!("只出现在图片搜索结果中: {}", item.image.name);
        item.score /= 2.;
    }

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.into_iter().take(limit).map(|r| r.image).collect()
}
