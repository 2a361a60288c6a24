/// Inputs shorter than this are insertion sorted.
pub const INSERTION_SORT_THRESHOLD: usize = 7;

/// Sort `items` ascending by the distance `key` returns, in place.
///
/// Short inputs use insertion sort, longer ones a middle-pivot quicksort with
/// Hoare partitioning. The sort is not stable: items of equal distance end up
/// in whatever relative order the partitioning leaves them.
pub fn sort_by_distance<T>(items: &mut [T], key: impl Fn(&T) -> f64) {
  if items.len() < INSERTION_SORT_THRESHOLD {
    insertion_sort(items, &key);
  } else {
    quicksort(items, &key);
  }
}

fn insertion_sort<T>(items: &mut [T], key: &impl Fn(&T) -> f64) {
  for i in 1..items.len() {
    let mut j = i;
    while j > 0 && key(&items[j - 1]) > key(&items[j]) {
      items.swap(j - 1, j);
      j -= 1;
    }
  }
}

fn quicksort<T>(items: &mut [T], key: &impl Fn(&T) -> f64) {
  if items.len() < 2 {
    return;
  }
  let pivot = key(&items[(items.len() - 1) / 2]);

  // i and j cross over before either leaves the slice, the pivot value itself
  // stops both scans
  let mut i = 0_isize;
  let mut j = items.len() as isize - 1;
  loop {
    while key(&items[i as usize]) < pivot {
      i += 1;
    }
    while pivot < key(&items[j as usize]) {
      j -= 1;
    }
    if i <= j {
      items.swap(i as usize, j as usize);
      i += 1;
      j -= 1;
    }
    if i > j {
      break;
    }
  }

  if j > 0 {
    quicksort(&mut items[..=j as usize], key);
  }
  if (i as usize) < items.len() - 1 {
    quicksort(&mut items[i as usize..], key);
  }
}
