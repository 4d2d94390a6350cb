//! Minimum-cost assignment over a rectangular cost matrix (Kuhn–Munkres,
//! shortest augmenting path with potentials).

/// Assign each row to a distinct column, minimizing total cost.
///
/// Returns `(row, column)` pairs sorted by row. With more rows than columns
/// only `columns` rows get a partner; the rest are absent from the result.
/// Rows must all have the same length.
pub fn solve(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let rows = cost.len();
    let cols = cost.first().map_or(0, Vec::len);
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    if rows <= cols {
        solve_wide(cost, rows, cols)
    } else {
        let transposed: Vec<Vec<f64>> = (0..cols)
            .map(|c| (0..rows).map(|r| cost[r][c]).collect())
            .collect();
        let mut pairs: Vec<(usize, usize)> = solve_wide(&transposed, cols, rows)
            .into_iter()
            .map(|(c, r)| (r, c))
            .collect();
        pairs.sort_unstable();
        pairs
    }
}

/// `rows <= cols`: every row is assigned.
fn solve_wide(cost: &[Vec<f64>], rows: usize, cols: usize) -> Vec<(usize, usize)> {
    // 1-based bookkeeping; index 0 is the virtual source.
    let mut u = vec![0.0f64; rows + 1];
    let mut v = vec![0.0f64; cols + 1];
    let mut row_of_col = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for row in 1..=rows {
        row_of_col[0] = row;
        let mut col0 = 0usize;
        let mut min_to = vec![f64::INFINITY; cols + 1];
        let mut used = vec![false; cols + 1];

        loop {
            used[col0] = true;
            let row0 = row_of_col[col0];
            let mut delta = f64::INFINITY;
            let mut col1 = 0usize;

            for col in 1..=cols {
                if used[col] {
                    continue;
                }
                let reduced = cost[row0 - 1][col - 1] - u[row0] - v[col];
                if reduced < min_to[col] {
                    min_to[col] = reduced;
                    way[col] = col0;
                }
                if min_to[col] < delta {
                    delta = min_to[col];
                    col1 = col;
                }
            }

            for col in 0..=cols {
                if used[col] {
                    u[row_of_col[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_to[col] -= delta;
                }
            }

            col0 = col1;
            if row_of_col[col0] == 0 {
                break;
            }
        }

        // Flip the augmenting path.
        loop {
            let prev = way[col0];
            row_of_col[col0] = row_of_col[prev];
            col0 = prev;
            if col0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=cols)
        .filter(|&col| row_of_col[col] != 0)
        .map(|col| (row_of_col[col] - 1, col - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(cost: &[Vec<f64>], pairs: &[(usize, usize)]) -> f64 {
        pairs.iter().map(|&(r, c)| cost[r][c]).sum()
    }

    #[test]
    fn square_matrix_finds_optimum() {
        let cost = vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ];
        let pairs = solve(&cost);
        assert_eq!(pairs.len(), 3);
        assert_eq!(total(&cost, &pairs), 5.0);
    }

    #[test]
    fn greedy_choice_is_not_optimal() {
        // Greedy takes (0,0)=0 then (1,1)=10; optimal is 1 + 1.
        let cost = vec![vec![0.0, 1.0], vec![1.0, 10.0]];
        assert_eq!(solve(&cost), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn more_rows_than_columns_leaves_rows_unassigned() {
        let cost = vec![vec![0.9], vec![0.0], vec![0.5]];
        assert_eq!(solve(&cost), vec![(1, 0)]);
    }

    #[test]
    fn more_columns_than_rows_assigns_every_row() {
        let cost = vec![vec![1.0, 0.2, 0.0], vec![0.0, 1.0, 1.0]];
        assert_eq!(solve(&cost), vec![(0, 2), (1, 0)]);
    }

    #[test]
    fn empty_inputs() {
        assert!(solve(&[]).is_empty());
        assert!(solve(&[vec![], vec![]]).is_empty());
    }
}
